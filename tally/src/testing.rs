use crate::{MemoryCounterStore, MemoryError};
use parking_lot::Mutex;
use std::{collections::VecDeque, fmt};
use tally_core::{CounterKey, CounterRecord, CounterStore, Created, Raised, StoreError, StoreErrorKind};

/// A store operation, as recorded by [FaultyStore].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Find,
    Create,
    Raise,
    Increment,
    Set,
}

/// A scripted failure for the next matching operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Fail the operation with an error of the given kind.
    Fail(Op, StoreErrorKind),

    /// Let another writer create the counter just before this create runs.
    Preempt,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FaultError {
    Injected(StoreErrorKind),
    Inner(MemoryError),
}

impl fmt::Display for FaultError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FaultError::Injected(kind) => write!(f, "injected {}", kind),
            FaultError::Inner(ref e) => fmt::Display::fmt(e, f),
        }
    }
}

impl StoreError for FaultError {
    fn kind(&self) -> StoreErrorKind {
        match *self {
            FaultError::Injected(kind) => kind,
            FaultError::Inner(ref e) => e.kind(),
        }
    }
}

impl From<MemoryError> for FaultError {
    fn from(err: MemoryError) -> Self {
        FaultError::Inner(err)
    }
}

/// A memory store that fails on cue and records every operation it sees.
#[derive(Debug, Default)]
pub struct FaultyStore {
    pub inner: MemoryCounterStore,
    script: Mutex<VecDeque<Fault>>,
    sticky: Mutex<Option<(Op, StoreErrorKind)>>,
    calls: Mutex<Vec<Op>>,
}

impl FaultyStore {
    pub fn new(script: Vec<Fault>) -> Self {
        FaultyStore {
            script: Mutex::new(script.into()),
            ..FaultyStore::default()
        }
    }

    /// Fails every future `op` with `kind`.
    pub fn always(op: Op, kind: StoreErrorKind) -> Self {
        let store = FaultyStore::default();
        *store.sticky.lock() = Some((op, kind));
        store
    }

    pub fn calls(&self) -> Vec<Op> {
        self.calls.lock().clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls.lock().iter().filter(|o| **o == op).count()
    }

    fn trip(&self, op: Op) -> Result<(), FaultError> {
        self.calls.lock().push(op);

        if let Some((sticky_op, kind)) = *self.sticky.lock() {
            if sticky_op == op {
                return Err(FaultError::Injected(kind));
            }
        }

        let mut script = self.script.lock();
        match script.front().copied() {
            Some(Fault::Fail(fault_op, kind)) if fault_op == op => {
                script.pop_front();
                Err(FaultError::Injected(kind))
            }
            _ => Ok(()),
        }
    }

    fn take_preempt(&self) -> bool {
        let mut script = self.script.lock();
        if script.front() == Some(&Fault::Preempt) {
            script.pop_front();
            true
        } else {
            false
        }
    }
}

impl CounterStore for FaultyStore {
    type Error = FaultError;

    fn initialize(&self) -> Result<(), Self::Error> {
        Ok(self.inner.initialize()?)
    }

    fn find(&self, key: &CounterKey) -> Result<Option<CounterRecord>, Self::Error> {
        self.trip(Op::Find)?;
        Ok(self.inner.find(key)?)
    }

    fn create_if_absent(&self, key: &CounterKey, initial_count: i64) -> Result<Created, Self::Error> {
        self.trip(Op::Create)?;
        if self.take_preempt() {
            self.inner.create_if_absent(key, initial_count)?;
        }
        Ok(self.inner.create_if_absent(key, initial_count)?)
    }

    fn compare_and_raise(&self, key: &CounterKey, lower_bound: i64, new_count: i64) -> Result<Raised, Self::Error> {
        self.trip(Op::Raise)?;
        Ok(self.inner.compare_and_raise(key, lower_bound, new_count)?)
    }

    fn increment_and_get(&self, key: &CounterKey, delta: i64) -> Result<i64, Self::Error> {
        self.trip(Op::Increment)?;
        Ok(self.inner.increment_and_get(key, delta)?)
    }

    fn set_count(&self, key: &CounterKey, value: i64) -> Result<i64, Self::Error> {
        self.trip(Op::Set)?;
        Ok(self.inner.set_count(key, value)?)
    }
}
