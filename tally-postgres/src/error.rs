use postgres::error::SqlState;
use std::{error, fmt, io};
use tally_core::{CounterKey, StoreError, StoreErrorKind};

/// Failures of the PostgreSQL counter store.
#[derive(Debug)]
pub enum PostgresError {
    /// The database rejected or failed a statement.
    Postgres(postgres::Error),

    /// No pooled connection could be checked out.
    Pool(r2d2::Error),

    /// An atomic update matched no counter row.
    Missing(CounterKey),
}

impl fmt::Display for PostgresError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PostgresError::Postgres(ref e) => write!(f, "postgres error: {}", e),
            PostgresError::Pool(ref e) => write!(f, "connection pool error: {}", e),
            PostgresError::Missing(ref key) => write!(f, "counter {}: no such counter", key),
        }
    }
}

impl error::Error for PostgresError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            PostgresError::Postgres(ref e) => Some(e),
            PostgresError::Pool(ref e) => Some(e),
            PostgresError::Missing(_) => None,
        }
    }
}

impl From<postgres::Error> for PostgresError {
    fn from(err: postgres::Error) -> Self {
        PostgresError::Postgres(err)
    }
}

impl From<r2d2::Error> for PostgresError {
    fn from(err: r2d2::Error) -> Self {
        PostgresError::Pool(err)
    }
}

impl StoreError for PostgresError {
    fn kind(&self) -> StoreErrorKind {
        match *self {
            PostgresError::Postgres(ref e) => classify(e),
            PostgresError::Pool(_) => StoreErrorKind::Unavailable,
            PostgresError::Missing(_) => StoreErrorKind::Missing,
        }
    }
}

fn classify(err: &postgres::Error) -> StoreErrorKind {
    if err.is_closed() {
        return StoreErrorKind::Unavailable;
    }

    match err.code() {
        Some(code) => classify_state(code),
        None => {
            let io_failure = error::Error::source(err).map_or(false, |source| source.is::<io::Error>());
            if io_failure {
                StoreErrorKind::Unavailable
            } else {
                StoreErrorKind::Fatal
            }
        }
    }
}

fn classify_state(code: &SqlState) -> StoreErrorKind {
    if *code == SqlState::UNIQUE_VIOLATION
        || *code == SqlState::T_R_SERIALIZATION_FAILURE
        || *code == SqlState::T_R_DEADLOCK_DETECTED
    {
        StoreErrorKind::Conflict
    } else if *code == SqlState::QUERY_CANCELED || *code == SqlState::LOCK_NOT_AVAILABLE {
        StoreErrorKind::Timeout
    } else if *code == SqlState::ADMIN_SHUTDOWN
        || *code == SqlState::CRASH_SHUTDOWN
        || *code == SqlState::CANNOT_CONNECT_NOW
        || *code == SqlState::TOO_MANY_CONNECTIONS
        || *code == SqlState::CONNECTION_FAILURE
        || *code == SqlState::CONNECTION_EXCEPTION
    {
        StoreErrorKind::Unavailable
    } else {
        StoreErrorKind::Fatal
    }
}
