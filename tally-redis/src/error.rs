use redis::ErrorKind;
use std::{error, fmt};
use tally_core::{CounterKey, StoreError, StoreErrorKind};

/// Failures of the Redis counter store.
#[derive(Debug)]
pub enum RedisError {
    /// The server rejected a command or the connection failed.
    Redis(redis::RedisError),

    /// No pooled connection could be checked out.
    Pool(r2d2::Error),

    /// A counter key could not be encoded.
    Serialization(serde_json::Error),

    /// An atomic update targeted a counter hash that does not exist.
    Missing(CounterKey),
}

impl fmt::Display for RedisError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RedisError::Redis(ref e) => write!(f, "redis error: {}", e),
            RedisError::Pool(ref e) => write!(f, "connection pool error: {}", e),
            RedisError::Serialization(ref e) => write!(f, "serialization error: {}", e),
            RedisError::Missing(ref key) => write!(f, "counter {}: no such counter", key),
        }
    }
}

impl error::Error for RedisError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            RedisError::Redis(ref e) => Some(e),
            RedisError::Pool(ref e) => Some(e),
            RedisError::Serialization(ref e) => Some(e),
            RedisError::Missing(_) => None,
        }
    }
}

impl From<redis::RedisError> for RedisError {
    fn from(err: redis::RedisError) -> Self {
        RedisError::Redis(err)
    }
}

impl From<r2d2::Error> for RedisError {
    fn from(err: r2d2::Error) -> Self {
        RedisError::Pool(err)
    }
}

impl From<serde_json::Error> for RedisError {
    fn from(err: serde_json::Error) -> Self {
        RedisError::Serialization(err)
    }
}

impl StoreError for RedisError {
    fn kind(&self) -> StoreErrorKind {
        match *self {
            RedisError::Redis(ref e) => classify(e),
            RedisError::Pool(_) => StoreErrorKind::Unavailable,
            RedisError::Serialization(_) => StoreErrorKind::Fatal,
            RedisError::Missing(_) => StoreErrorKind::Missing,
        }
    }
}

fn classify(err: &redis::RedisError) -> StoreErrorKind {
    if err.is_timeout() {
        return StoreErrorKind::Timeout;
    }

    if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        return StoreErrorKind::Unavailable;
    }

    match err.kind() {
        ErrorKind::TryAgain | ErrorKind::BusyLoadingError | ErrorKind::ClusterDown | ErrorKind::MasterDown => {
            StoreErrorKind::Unavailable
        }
        _ => StoreErrorKind::Fatal,
    }
}
