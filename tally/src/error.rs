use std::{error, fmt};
use tally_core::{CounterKey, SettingsError, StoreError, StoreErrorKind};

/// Invalid or missing settings, detected at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigurationError {
    /// No model name was given.
    MissingModel,

    /// The model option was present but not a string.
    ModelNotString,

    /// A grouping field was combined with the primary identifier as the tracked field.
    GroupingOnPrimaryKey {
        /// The requested grouping field.
        grouping_field: String,
    },

    /// The options could not be read.
    InvalidOptions(String),

    /// The start/increment arithmetic was rejected.
    Settings(SettingsError),

    /// A retry policy must allow at least one attempt.
    ZeroRetryAttempts,
}

impl error::Error for ConfigurationError {}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigurationError::MissingModel => f.write_str("model must be set"),
            ConfigurationError::ModelNotString => f.write_str("model must be a string"),
            ConfigurationError::GroupingOnPrimaryKey { ref grouping_field } => write!(
                f,
                "cannot use grouping field {} with the primary identifier, choose a different field name",
                grouping_field,
            ),
            ConfigurationError::InvalidOptions(ref reason) => write!(f, "invalid options: {}", reason),
            ConfigurationError::Settings(ref e) => write!(f, "invalid settings: {}", e),
            ConfigurationError::ZeroRetryAttempts => f.write_str("retry policy must allow at least one attempt"),
        }
    }
}

impl From<SettingsError> for ConfigurationError {
    fn from(err: SettingsError) -> Self {
        ConfigurationError::Settings(err)
    }
}

/// An allocation, peek, reset or registration failure.
///
/// Benign creation races never surface here; they are resolved inside the allocator.
#[derive(Debug)]
pub enum Error<E> {
    /// Invalid settings.
    Configuration(ConfigurationError),

    /// The allocator was used before [initialize](crate::Allocator::initialize) completed.
    NotInitialized,

    /// The store timed out, and kept timing out through the retry budget.
    StoreTimeout(E),

    /// The store could not be reached, and stayed unreachable through the retry budget.
    StoreUnavailable(E),

    /// The store failed in a way that retrying will not fix.
    Store(E),

    /// The retry ceiling was reached while still hitting conflicts.
    AllocationExhausted {
        /// The counter being allocated.
        key: CounterKey,
        /// How many attempts were made.
        attempts: u32,
    },

    /// The next value of the counter does not fit in an `i64`.
    CounterOverflow(CounterKey),

    /// The record carried a whole number outside the `i64` range.
    SuppliedOutOfRange {
        /// The counter the value would have been reconciled into.
        key: CounterKey,
        /// The supplied value.
        value: serde_json::Value,
    },
}

impl<E: StoreError> Error<E> {
    /// Wraps a store error according to its classification.
    pub fn from_store(err: E) -> Self {
        match err.kind() {
            StoreErrorKind::Timeout => Error::StoreTimeout(err),
            StoreErrorKind::Unavailable => Error::StoreUnavailable(err),
            _ => Error::Store(err),
        }
    }
}

impl<E> Error<E> {
    /// Whether retrying the whole record save might succeed.
    pub fn is_retryable(&self) -> bool {
        match *self {
            Error::StoreTimeout(_) | Error::StoreUnavailable(_) | Error::AllocationExhausted { .. } => true,
            _ => false,
        }
    }
}

impl<E: StoreError> error::Error for Error<E> {}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Configuration(ref e) => write!(f, "configuration error: {}", e),
            Error::NotInitialized => f.write_str("counter store has not been initialized"),
            Error::StoreTimeout(ref e) => write!(f, "store timed out: {}", e),
            Error::StoreUnavailable(ref e) => write!(f, "store unavailable: {}", e),
            Error::Store(ref e) => write!(f, "store error: {}", e),
            Error::AllocationExhausted { ref key, attempts } =>
                write!(f, "counter {}: allocation still conflicting after {} attempts", key, attempts),
            Error::CounterOverflow(ref key) => write!(f, "counter {}: next value overflows", key),
            Error::SuppliedOutOfRange { ref key, ref value } =>
                write!(f, "counter {}: supplied value {} is out of range", key, value),
        }
    }
}

impl<E> From<ConfigurationError> for Error<E> {
    fn from(err: ConfigurationError) -> Self {
        Error::Configuration(err)
    }
}
