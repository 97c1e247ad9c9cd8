use crate::types::{CounterKey, CounterRecord, Created, Raised};
use std::fmt;

/// How an adapter failure should be treated by the allocation engine.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// A uniqueness violation outside the benign first-creation race.
    Conflict,

    /// An atomic update targeted a counter record that does not exist.
    Missing,

    /// The operation exceeded the caller-supplied timeout.
    Timeout,

    /// The store could not be reached.
    Unavailable,

    /// Any other failure. Never retried.
    Fatal,
}

impl StoreErrorKind {
    /// Whether a failure of this kind may resolve by retrying the whole allocation.
    #[inline]
    pub fn is_transient(self) -> bool {
        self != StoreErrorKind::Fatal
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StoreErrorKind::Conflict => f.write_str("conflict"),
            StoreErrorKind::Missing => f.write_str("missing counter"),
            StoreErrorKind::Timeout => f.write_str("timeout"),
            StoreErrorKind::Unavailable => f.write_str("unavailable"),
            StoreErrorKind::Fatal => f.write_str("fatal"),
        }
    }
}

/// An error raised by a [CounterStore], able to classify itself.
pub trait StoreError: fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// The classification of this failure.
    fn kind(&self) -> StoreErrorKind;
}

/// The contract between the allocation engine and a persistent record store.
///
/// Implementations carry no business logic. Every mutating operation must be a
/// single atomic operation in the underlying store; the engine never reads a count
/// and writes it back.
pub trait CounterStore {
    /// The error type.
    type Error: StoreError;

    /// Ensures the counter collection and its uniqueness constraint on
    /// `(model, field, group)` exist. Must be idempotent.
    fn initialize(&self) -> Result<(), Self::Error>;

    /// Point lookup of the counter record for `key`.
    fn find(&self, key: &CounterKey) -> Result<Option<CounterRecord>, Self::Error>;

    /// Inserts a record for `key` with `initial_count`, unless one already exists.
    ///
    /// An existing record is reported as [Created::Conflict], never as an error.
    fn create_if_absent(&self, key: &CounterKey, initial_count: i64) -> Result<Created, Self::Error>;

    /// Sets the stored count to `new_count` only if it is currently below `lower_bound`.
    fn compare_and_raise(&self, key: &CounterKey, lower_bound: i64, new_count: i64) -> Result<Raised, Self::Error>;

    /// Adds `delta` to the stored count, returning the post-increment value.
    fn increment_and_get(&self, key: &CounterKey, delta: i64) -> Result<i64, Self::Error>;

    /// Overwrites the stored count unconditionally, creating the record if absent.
    fn set_count(&self, key: &CounterKey, value: i64) -> Result<i64, Self::Error>;
}

impl<'a, S> CounterStore for &'a S
where
    S: CounterStore + ?Sized,
{
    type Error = S::Error;

    #[inline]
    fn initialize(&self) -> Result<(), Self::Error> {
        (**self).initialize()
    }

    #[inline]
    fn find(&self, key: &CounterKey) -> Result<Option<CounterRecord>, Self::Error> {
        (**self).find(key)
    }

    #[inline]
    fn create_if_absent(&self, key: &CounterKey, initial_count: i64) -> Result<Created, Self::Error> {
        (**self).create_if_absent(key, initial_count)
    }

    #[inline]
    fn compare_and_raise(&self, key: &CounterKey, lower_bound: i64, new_count: i64) -> Result<Raised, Self::Error> {
        (**self).compare_and_raise(key, lower_bound, new_count)
    }

    #[inline]
    fn increment_and_get(&self, key: &CounterKey, delta: i64) -> Result<i64, Self::Error> {
        (**self).increment_and_get(key, delta)
    }

    #[inline]
    fn set_count(&self, key: &CounterKey, value: i64) -> Result<i64, Self::Error> {
        (**self).set_count(key, value)
    }
}

impl<S> CounterStore for std::sync::Arc<S>
where
    S: CounterStore + ?Sized,
{
    type Error = S::Error;

    #[inline]
    fn initialize(&self) -> Result<(), Self::Error> {
        (**self).initialize()
    }

    #[inline]
    fn find(&self, key: &CounterKey) -> Result<Option<CounterRecord>, Self::Error> {
        (**self).find(key)
    }

    #[inline]
    fn create_if_absent(&self, key: &CounterKey, initial_count: i64) -> Result<Created, Self::Error> {
        (**self).create_if_absent(key, initial_count)
    }

    #[inline]
    fn compare_and_raise(&self, key: &CounterKey, lower_bound: i64, new_count: i64) -> Result<Raised, Self::Error> {
        (**self).compare_and_raise(key, lower_bound, new_count)
    }

    #[inline]
    fn increment_and_get(&self, key: &CounterKey, delta: i64) -> Result<i64, Self::Error> {
        (**self).increment_and_get(key, delta)
    }

    #[inline]
    fn set_count(&self, key: &CounterKey, value: i64) -> Result<i64, Self::Error> {
        (**self).set_count(key, value)
    }
}
