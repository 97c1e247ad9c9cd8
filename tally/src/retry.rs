use crate::error::ConfigurationError;
use std::time::Duration;

/// How the delay between allocation attempts grows.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Backoff {
    /// Every retry waits the initial delay.
    Fixed,

    /// Each retry doubles the previous delay, up to the maximum delay.
    Exponential,
}

/// The bounded retry budget of a single allocation.
///
/// An attempt is one full pass of locate-or-create followed by the atomic update.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Attempts made by the default policy.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Creates a policy that waits `delay` between every attempt.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Result<Self, ConfigurationError> {
        RetryPolicy::new(max_attempts, delay, delay, Backoff::Fixed)
    }

    /// Creates a policy that doubles its delay after every attempt, capped at `max_delay`.
    pub fn exponential(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Result<Self, ConfigurationError> {
        RetryPolicy::new(max_attempts, initial_delay, max_delay, Backoff::Exponential)
    }

    /// Creates a policy that retries immediately.
    pub fn immediate(max_attempts: u32) -> Result<Self, ConfigurationError> {
        RetryPolicy::fixed(max_attempts, Duration::from_millis(0))
    }

    fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration, backoff: Backoff) -> Result<Self, ConfigurationError> {
        if max_attempts == 0 {
            return Err(ConfigurationError::ZeroRetryAttempts);
        }

        Ok(RetryPolicy {
            max_attempts,
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            backoff,
        })
    }

    /// The total number of attempts, including the first.
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The growth strategy.
    #[inline]
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// The delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.initial_delay,
            Backoff::Exponential => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::max_value());
                self.initial_delay
                    .checked_mul(factor)
                    .map_or(self.max_delay, |delay| delay.min(self.max_delay))
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(100),
            backoff: Backoff::Exponential,
        }
    }
}
