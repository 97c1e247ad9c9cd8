//! # tally-redis
//!
//! A [CounterStore](tally_core::CounterStore) keeping one Redis hash per counter,
//! reached through an r2d2 connection pool.

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

pub use crate::error::RedisError;
pub use crate::store::{Config, RedisCounterStore, SocketTimeouts};
