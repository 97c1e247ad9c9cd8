//! # tally
//!
//! Durable, monotonically-increasing counters shared across concurrent writers.
//!
//! An [Allocator] wraps a [CounterStore] and atomically claims the next value of a
//! named counter before the caller persists its own record. Counters are created
//! lazily, converge when several writers race to create the same counter, and can be
//! raised to match externally supplied values when importing legacy data.
//!
//! ```
//! use tally::{Allocation, Allocator, FieldOptions, MemoryCounterStore};
//!
//! let allocator = Allocator::initialized(MemoryCounterStore::default()).unwrap();
//! let invoices = allocator
//!     .register(FieldOptions::new("Invoice").with_field("number").with_start_at(100))
//!     .unwrap();
//!
//! assert_eq!(invoices.peek(None).unwrap(), 100);
//! assert_eq!(invoices.allocate(None, None).unwrap(), Allocation::Assigned(100));
//! assert_eq!(invoices.allocate(None, None).unwrap(), Allocation::Assigned(101));
//! ```

#![warn(
    unused_import_braces,
    unused_imports,
    unused_qualifications,
    missing_docs,
)]

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use,
)]

mod allocator;
mod error;
mod memory;
mod options;
mod retry;
mod sequence;

#[cfg(test)]
mod testing;

pub use tally_core::{
    AllocatorSettings, CounterKey, CounterRecord, CounterStore, Created, Identity, OutputFilter, Raised, SettingsError,
    StoreError, StoreErrorKind,
};

#[doc(inline)]
pub use allocator::{numeric_value, Allocation, Allocator};
#[doc(inline)]
pub use error::{ConfigurationError, Error};
#[doc(inline)]
pub use memory::{MemoryCounterStore, MemoryError};
#[doc(inline)]
pub use options::{FieldConfig, FieldOptions, OwnerIndex, PRIMARY_KEY};
#[doc(inline)]
pub use retry::{Backoff, RetryPolicy};
#[doc(inline)]
pub use sequence::Sequence;

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(MemoryCounterStore: CounterStore, Send, Sync);
    assert_impl_all!(Allocator<MemoryCounterStore>: Send, Sync);
    assert_impl_all!(Error<MemoryError>: std::error::Error, Send, Sync);
    assert_impl_all!(ConfigurationError: std::error::Error, Clone, PartialEq);
}
