//! # tally-core
//!
//! `tally-core` defines the core types and the store contract for durable,
//! monotonically-increasing counters shared across concurrent writers.

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

mod settings;
mod store;
mod types;

#[doc(inline)]
pub use settings::{AllocatorSettings, Identity, OutputFilter, SettingsError};
#[doc(inline)]
pub use store::{CounterStore, StoreError, StoreErrorKind};
#[doc(inline)]
pub use types::{CounterKey, CounterRecord, Created, Raised};

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::{assert_impl_all, assert_obj_safe};
    use std::fmt;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct TestError;

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("test error")
        }
    }

    impl StoreError for TestError {
        fn kind(&self) -> StoreErrorKind {
            StoreErrorKind::Fatal
        }
    }

    assert_obj_safe!(CounterStore<Error = TestError>);
    assert_impl_all!(CounterKey: Send, Sync, Clone, std::hash::Hash, Ord);
    assert_impl_all!(AllocatorSettings: Send, Sync, Clone);

    #[test]
    fn identity_filter_returns_the_raw_count() {
        assert_eq!(Identity.apply(41), 41);
    }

    #[test]
    fn closures_are_output_filters() {
        let filter = |raw: i64| format!("R{}", raw);
        assert_eq!(filter.apply(7), "R7");
    }
}
