use crate::{
    error::Error,
    options::FieldOptions,
    retry::RetryPolicy,
    sequence::Sequence,
};
use log::{debug, trace, warn};
use serde_json::Value;
use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};
use tally_core::{
    AllocatorSettings, CounterKey, CounterStore, Created, Identity, OutputFilter, Raised, StoreError, StoreErrorKind,
};

/// The result of an allocation.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Allocation<T> {
    /// A fresh value was claimed and presented through the output filter.
    Assigned(T),

    /// The caller supplied its own numeric value; the counter was raised to it if it
    /// was behind. The caller's value stands and no new value is produced.
    Reconciled(Raised),
}

impl<T> Allocation<T> {
    /// The assigned value, if one was claimed.
    pub fn assigned(self) -> Option<T> {
        match self {
            Allocation::Assigned(value) => Some(value),
            Allocation::Reconciled(_) => None,
        }
    }
}

/// Reads a record field value as a count, if it is numeric.
///
/// Integers within `i64` and floats without a fractional part qualify. Strings never
/// do, even when they spell a number.
pub fn numeric_value(value: &Value) -> Option<i64> {
    let number = match *value {
        Value::Number(ref number) => number,
        _ => return None,
    };

    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::min_value() as f64 && *f < i64::max_value() as f64)
            .map(|f| f as i64)
    })
}

fn is_out_of_range(value: &Value) -> bool {
    match *value {
        Value::Number(ref number) => {
            number.as_i64().is_none() && (number.is_u64() || number.as_f64().map_or(false, |f| f.fract() == 0.0))
        }
        _ => false,
    }
}

/// The allocation engine.
///
/// Stateless across calls apart from its initialization flag: every guarantee comes
/// from the store's atomic primitives, so any number of allocators in any number of
/// processes may share one store.
pub struct Allocator<S> {
    store: S,
    retry: RetryPolicy,
    initialized: AtomicBool,
}

impl<S: fmt::Debug> fmt::Debug for Allocator<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("store", &self.store)
            .field("retry", &self.retry)
            .field("initialized", &self.initialized.load(Ordering::Acquire))
            .finish()
    }
}

impl<S> Allocator<S>
where
    S: CounterStore,
{
    /// Wraps a store. The allocator must be [initialized](Allocator::initialize) before use.
    pub fn new(store: S) -> Self {
        Allocator {
            store,
            retry: RetryPolicy::default(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Wraps and initializes a store.
    pub fn initialized(store: S) -> Result<Self, Error<S::Error>> {
        let allocator = Allocator::new(store);
        allocator.initialize()?;
        Ok(allocator)
    }

    /// Replaces the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ensures the counter collection and its uniqueness constraint exist. Idempotent.
    pub fn initialize(&self) -> Result<(), Error<S::Error>> {
        if self.is_initialized() {
            return Ok(());
        }

        self.store.initialize().map_err(Error::from_store)?;
        self.initialized.store(true, Ordering::Release);
        debug!("counter store initialized");
        Ok(())
    }

    /// Whether [initialize](Allocator::initialize) has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The retry policy applied to allocations.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Validates `options` and binds them to this allocator, presenting raw counts as-is.
    pub fn register(&self, options: FieldOptions) -> Result<Sequence<S, Identity>, Error<S::Error>> {
        self.register_with_filter(options, Identity)
    }

    /// Validates `options` and binds them to this allocator with an output filter.
    pub fn register_with_filter<F>(&self, options: FieldOptions, output_filter: F) -> Result<Sequence<S, F>, Error<S::Error>>
    where
        F: OutputFilter,
    {
        let config = options.validate()?;
        self.ensure_initialized()?;
        debug!("registered sequence for {}/{}", config.model(), config.field());
        Ok(Sequence::new(self, config, output_filter))
    }

    /// The value the next allocation for `key` would yield. Never mutates the counter.
    ///
    /// The result is not reserved; a concurrent allocation may claim it first.
    pub fn peek<F>(&self, key: &CounterKey, settings: &AllocatorSettings<F>) -> Result<i64, Error<S::Error>> {
        self.ensure_initialized()?;

        let record = self.store.find(key).map_err(Error::from_store)?;
        trace!("counter {}: peeked; count: {:?}", key, record.as_ref().map(|r| r.count));

        match record {
            Some(record) => settings.next_after(record.count).ok_or_else(|| Error::CounterOverflow(key.to_owned())),
            None => Ok(settings.start_at()),
        }
    }

    /// Claims the next value for `key`, or reconciles the counter with a value the
    /// owning record already carries.
    ///
    /// When `supplied` is numeric the counter is raised to it if behind, and nothing new
    /// is claimed. Otherwise the counter advances by one step and the new raw count is
    /// presented through the output filter.
    ///
    /// A whole number outside the `i64` range is rejected rather than replaced.
    ///
    /// The engine does not deduplicate calls: each call for the same in-flight record
    /// claims another value.
    pub fn allocate<F>(
        &self,
        key: &CounterKey,
        settings: &AllocatorSettings<F>,
        supplied: Option<&Value>,
    ) -> Result<Allocation<F::Output>, Error<S::Error>>
    where
        F: OutputFilter,
    {
        self.ensure_initialized()?;

        if let Some(value) = supplied.filter(|value| is_out_of_range(value)) {
            return Err(Error::SuppliedOutOfRange {
                key: key.to_owned(),
                value: value.clone(),
            });
        }

        let supplied = supplied.and_then(numeric_value);
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match self.try_allocate(key, settings, supplied) {
                Ok(allocation) => return Ok(allocation),
                Err(err) => err,
            };

            let kind = err.kind();
            if !kind.is_transient() {
                return Err(Error::Store(err));
            }

            if attempt >= max_attempts {
                warn!("counter {}: giving up after {} attempts; last error: {}", key, attempt, err);
                return Err(match kind {
                    StoreErrorKind::Timeout => Error::StoreTimeout(err),
                    StoreErrorKind::Unavailable => Error::StoreUnavailable(err),
                    _ => Error::AllocationExhausted {
                        key: key.to_owned(),
                        attempts: attempt,
                    },
                });
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                "counter {}: attempt {} of {} failed ({}); retrying in {:?}",
                key, attempt, max_attempts, err, delay,
            );
            thread::sleep(delay);
        }
    }

    /// Re-initializes the counter for `key` so the next allocation yields `start_at`.
    ///
    /// Creates the counter if it does not exist. Returns `start_at`.
    pub fn reset_count<F>(&self, key: &CounterKey, settings: &AllocatorSettings<F>) -> Result<i64, Error<S::Error>> {
        self.ensure_initialized()?;

        let count = self.store.set_count(key, settings.baseline()).map_err(Error::from_store)?;
        debug!("counter {}: reset; count: {}", key, count);

        Ok(settings.start_at())
    }

    fn ensure_initialized(&self) -> Result<(), Error<S::Error>> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn try_allocate<F>(
        &self,
        key: &CounterKey,
        settings: &AllocatorSettings<F>,
        supplied: Option<i64>,
    ) -> Result<Allocation<F::Output>, S::Error>
    where
        F: OutputFilter,
    {
        self.ensure_counter(key, settings)?;

        if let Some(value) = supplied {
            let raised = self.store.compare_and_raise(key, value, value)?;
            debug!("counter {}: reconciled with supplied value; value: {}, outcome: {}", key, value, raised);
            return Ok(Allocation::Reconciled(raised));
        }

        let count = self.store.increment_and_get(key, settings.increment_by())?;
        trace!("counter {}: allocated; count: {}", key, count);

        Ok(Allocation::Assigned(settings.present(count)))
    }

    fn ensure_counter<F>(&self, key: &CounterKey, settings: &AllocatorSettings<F>) -> Result<(), S::Error> {
        if let Some(record) = self.store.find(key)? {
            trace!("counter {}: found; count: {}", key, record.count);
            return Ok(());
        }

        match self.store.create_if_absent(key, settings.baseline())? {
            Created::Inserted => {
                debug!("counter {}: created; count: {}", key, settings.baseline());
            }
            Created::Conflict => {
                let record = self.store.find(key)?;
                trace!(
                    "counter {}: created concurrently; count: {:?}",
                    key,
                    record.map(|r| r.count),
                );
            }
        }

        Ok(())
    }
}

#[path = "allocator_tests.rs"]
#[cfg(test)]
mod tests;
