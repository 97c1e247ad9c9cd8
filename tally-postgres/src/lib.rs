//! # tally-postgres
//!
//! A [CounterStore](tally_core::CounterStore) backed by a PostgreSQL table, reached
//! through an r2d2 connection pool.
//!
//! Counters live in one table (by default `identity_counters`) with a unique
//! constraint on `(model, field, group_value)`. Every mutation is a single
//! statement, so any number of processes may allocate from the same table.

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

mod error;
mod store;

pub use crate::error::PostgresError;
pub use crate::store::{Config, PostgresCounterStore, StatementTimeout};
