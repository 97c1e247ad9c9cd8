use hashbrown::{hash_map::DefaultHashBuilder, HashMap};
use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard};
use std::{error, fmt, hash::BuildHasher, time::Duration};
use tally_core::{CounterKey, CounterRecord, CounterStore, Created, Raised, StoreError, StoreErrorKind};

/// Failures of the in-memory counter store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// A lock could not be acquired within the configured timeout.
    Timeout(Duration),

    /// The counter record does not exist.
    Missing(CounterKey),

    /// The counter would leave the `i64` range.
    Overflow(CounterKey),
}

impl error::Error for MemoryError {}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MemoryError::Timeout(ref timeout) => write!(f, "lock not acquired within {:?}", timeout),
            MemoryError::Missing(ref key) => write!(f, "counter {}: no such counter", key),
            MemoryError::Overflow(ref key) => write!(f, "counter {}: count overflows", key),
        }
    }
}

impl StoreError for MemoryError {
    fn kind(&self) -> StoreErrorKind {
        match *self {
            MemoryError::Timeout(_) => StoreErrorKind::Timeout,
            MemoryError::Missing(_) => StoreErrorKind::Missing,
            MemoryError::Overflow(_) => StoreErrorKind::Fatal,
        }
    }
}

/// A process-local counter store.
///
/// Each counter lives in its own lock so that allocations for different keys do not
/// contend once their records exist.
pub struct MemoryCounterStore<Hasher = DefaultHashBuilder>
where
    Hasher: BuildHasher,
{
    inner: RwLock<HashMap<CounterKey, RwLock<i64>, Hasher>>,
    timeout: Option<Duration>,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        MemoryCounterStore::with_hasher(DefaultHashBuilder::default())
    }
}

impl<Hasher> fmt::Debug for MemoryCounterStore<Hasher>
where
    Hasher: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MemoryCounterStore")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MemoryCounterStore {
    /// Creates a store whose operations give up after waiting `timeout` for a lock.
    pub fn with_timeout(timeout: Duration) -> Self {
        MemoryCounterStore {
            timeout: Some(timeout),
            ..MemoryCounterStore::default()
        }
    }
}

impl<Hasher> MemoryCounterStore<Hasher>
where
    Hasher: BuildHasher,
{
    /// Creates a store using an alternate hasher.
    pub fn with_hasher(hasher: Hasher) -> Self {
        MemoryCounterStore {
            inner: RwLock::new(HashMap::with_hasher(hasher)),
            timeout: None,
        }
    }

    /// A copy of every counter record, ordered by key.
    pub fn records(&self) -> Result<Vec<CounterRecord>, MemoryError> {
        let table = self.read_table()?;

        let mut records = table
            .iter()
            .map(|(key, cell)| {
                Ok(CounterRecord {
                    key: key.to_owned(),
                    count: *self.read_cell(cell)?,
                })
            })
            .collect::<Result<Vec<_>, MemoryError>>()?;

        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    fn read_table(&self) -> Result<RwLockReadGuard<HashMap<CounterKey, RwLock<i64>, Hasher>>, MemoryError> {
        match self.timeout {
            Some(timeout) => self.inner.try_read_for(timeout).ok_or(MemoryError::Timeout(timeout)),
            None => Ok(self.inner.read()),
        }
    }

    fn upgradable_table(&self) -> Result<RwLockUpgradableReadGuard<HashMap<CounterKey, RwLock<i64>, Hasher>>, MemoryError> {
        match self.timeout {
            Some(timeout) => self.inner.try_upgradable_read_for(timeout).ok_or(MemoryError::Timeout(timeout)),
            None => Ok(self.inner.upgradable_read()),
        }
    }

    fn upgrade_table<'a>(
        &self,
        table: RwLockUpgradableReadGuard<'a, HashMap<CounterKey, RwLock<i64>, Hasher>>,
    ) -> Result<RwLockWriteGuard<'a, HashMap<CounterKey, RwLock<i64>, Hasher>>, MemoryError> {
        match self.timeout {
            Some(timeout) => RwLockUpgradableReadGuard::try_upgrade_for(table, timeout).map_err(|_| MemoryError::Timeout(timeout)),
            None => Ok(RwLockUpgradableReadGuard::upgrade(table)),
        }
    }

    fn read_cell<'a>(&self, cell: &'a RwLock<i64>) -> Result<RwLockReadGuard<'a, i64>, MemoryError> {
        match self.timeout {
            Some(timeout) => cell.try_read_for(timeout).ok_or(MemoryError::Timeout(timeout)),
            None => Ok(cell.read()),
        }
    }

    fn write_cell<'a>(&self, cell: &'a RwLock<i64>) -> Result<RwLockWriteGuard<'a, i64>, MemoryError> {
        match self.timeout {
            Some(timeout) => cell.try_write_for(timeout).ok_or(MemoryError::Timeout(timeout)),
            None => Ok(cell.write()),
        }
    }
}

impl<Hasher> CounterStore for MemoryCounterStore<Hasher>
where
    Hasher: BuildHasher,
{
    type Error = MemoryError;

    fn initialize(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn find(&self, key: &CounterKey) -> Result<Option<CounterRecord>, Self::Error> {
        let table = self.read_table()?;

        match table.get(key) {
            Some(cell) => Ok(Some(CounterRecord {
                key: key.to_owned(),
                count: *self.read_cell(cell)?,
            })),
            None => Ok(None),
        }
    }

    fn create_if_absent(&self, key: &CounterKey, initial_count: i64) -> Result<Created, Self::Error> {
        let table = self.upgradable_table()?;

        if table.contains_key(key) {
            return Ok(Created::Conflict);
        }

        let mut table = self.upgrade_table(table)?;
        table.insert(key.to_owned(), RwLock::new(initial_count));

        Ok(Created::Inserted)
    }

    fn compare_and_raise(&self, key: &CounterKey, lower_bound: i64, new_count: i64) -> Result<Raised, Self::Error> {
        let table = self.read_table()?;
        let cell = table.get(key).ok_or_else(|| MemoryError::Missing(key.to_owned()))?;
        let mut count = self.write_cell(cell)?;

        if *count < lower_bound {
            *count = new_count;
            Ok(Raised::Updated)
        } else {
            Ok(Raised::NotApplied)
        }
    }

    fn increment_and_get(&self, key: &CounterKey, delta: i64) -> Result<i64, Self::Error> {
        let table = self.read_table()?;
        let cell = table.get(key).ok_or_else(|| MemoryError::Missing(key.to_owned()))?;
        let mut count = self.write_cell(cell)?;

        *count = count.checked_add(delta).ok_or_else(|| MemoryError::Overflow(key.to_owned()))?;
        Ok(*count)
    }

    fn set_count(&self, key: &CounterKey, value: i64) -> Result<i64, Self::Error> {
        let table = self.upgradable_table()?;

        if table.contains_key(key) {
            let table = RwLockUpgradableReadGuard::downgrade(table);
            if let Some(cell) = table.get(key) {
                *self.write_cell(cell)? = value;
            }
        } else {
            let mut table = self.upgrade_table(table)?;
            table.insert(key.to_owned(), RwLock::new(value));
        }

        Ok(value)
    }
}

#[path = "memory_tests.rs"]
#[cfg(test)]
mod tests;
