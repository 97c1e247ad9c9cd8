use std::{any, error, fmt};

/// A pure transform applied to a raw count before it is returned to a caller.
///
/// The stored count is always the raw integer; the filter is never persisted.
pub trait OutputFilter {
    /// The presented value.
    type Output;

    /// Presents a raw count.
    fn apply(&self, raw: i64) -> Self::Output;
}

impl<F, T> OutputFilter for F
where
    F: Fn(i64) -> T,
{
    type Output = T;

    #[inline]
    fn apply(&self, raw: i64) -> T {
        self(raw)
    }
}

/// The default output filter, returning the raw count unchanged.
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq)]
pub struct Identity;

impl OutputFilter for Identity {
    type Output = i64;

    #[inline]
    fn apply(&self, raw: i64) -> i64 {
        raw
    }
}

/// Settings rejected when constructing [AllocatorSettings].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum SettingsError {
    /// The step size was zero or negative.
    NonPositiveIncrement(i64),

    /// `start_at - increment_by` does not fit in an `i64`.
    BaselineOverflow {
        /// The requested first value.
        start_at: i64,
        /// The requested step size.
        increment_by: i64,
    },
}

impl error::Error for SettingsError {}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SettingsError::NonPositiveIncrement(step) => write!(f, "incrementBy must be greater than zero, got {}", step),
            SettingsError::BaselineOverflow { start_at, increment_by } =>
                write!(f, "startAt {} minus incrementBy {} overflows", start_at, increment_by),
        }
    }
}

/// The per-field arithmetic of a sequence: where it starts, how far it steps and how
/// its values are presented.
///
/// One set of settings governs every grouping value of a model's field.
#[derive(Clone)]
pub struct AllocatorSettings<F = Identity> {
    start_at: i64,
    increment_by: i64,
    baseline: i64,
    output_filter: F,
}

impl AllocatorSettings<Identity> {
    /// Validates and creates settings with the identity output filter.
    pub fn new(start_at: i64, increment_by: i64) -> Result<Self, SettingsError> {
        if increment_by <= 0 {
            return Err(SettingsError::NonPositiveIncrement(increment_by));
        }

        let baseline = start_at
            .checked_sub(increment_by)
            .ok_or(SettingsError::BaselineOverflow { start_at, increment_by })?;

        Ok(AllocatorSettings {
            start_at,
            increment_by,
            baseline,
            output_filter: Identity,
        })
    }
}

impl Default for AllocatorSettings<Identity> {
    fn default() -> Self {
        AllocatorSettings {
            start_at: 0,
            increment_by: 1,
            baseline: -1,
            output_filter: Identity,
        }
    }
}

impl<F> AllocatorSettings<F> {
    /// Replaces the output filter.
    pub fn with_output_filter<G: OutputFilter>(self, output_filter: G) -> AllocatorSettings<G> {
        AllocatorSettings {
            start_at: self.start_at,
            increment_by: self.increment_by,
            baseline: self.baseline,
            output_filter,
        }
    }

    /// The first value returned for a fresh counter.
    #[inline]
    pub fn start_at(&self) -> i64 {
        self.start_at
    }

    /// The step size.
    #[inline]
    pub fn increment_by(&self) -> i64 {
        self.increment_by
    }

    /// The implicit count of a counter that has never allocated: `start_at - increment_by`.
    #[inline]
    pub fn baseline(&self) -> i64 {
        self.baseline
    }

    /// The raw value that follows `count`, if it fits.
    #[inline]
    pub fn next_after(&self, count: i64) -> Option<i64> {
        count.checked_add(self.increment_by)
    }

    /// The configured output filter.
    #[inline]
    pub fn output_filter(&self) -> &F {
        &self.output_filter
    }
}

impl<F: OutputFilter> AllocatorSettings<F> {
    /// Presents a raw count through the output filter.
    #[inline]
    pub fn present(&self, raw: i64) -> F::Output {
        self.output_filter.apply(raw)
    }
}

impl<F> fmt::Debug for AllocatorSettings<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AllocatorSettings")
            .field("start_at", &self.start_at)
            .field("increment_by", &self.increment_by)
            .field("output_filter", &any::type_name::<F>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_start_at_zero_and_step_by_one() {
        let settings = AllocatorSettings::default();
        assert_eq!(settings.start_at(), 0);
        assert_eq!(settings.increment_by(), 1);
        assert_eq!(settings.baseline(), -1);
    }

    #[test]
    fn baseline_is_one_step_before_start() {
        let settings = AllocatorSettings::new(3, 5).unwrap();
        assert_eq!(settings.baseline(), -2);
        assert_eq!(settings.next_after(settings.baseline()), Some(3));
    }

    #[test]
    fn zero_increment_is_rejected() {
        assert_eq!(AllocatorSettings::new(0, 0).unwrap_err(), SettingsError::NonPositiveIncrement(0));
    }

    #[test]
    fn negative_increment_is_rejected() {
        assert_eq!(AllocatorSettings::new(0, -2).unwrap_err(), SettingsError::NonPositiveIncrement(-2));
    }

    #[test]
    fn baseline_overflow_is_rejected() {
        assert_eq!(
            AllocatorSettings::new(i64::min_value(), 1).unwrap_err(),
            SettingsError::BaselineOverflow { start_at: i64::min_value(), increment_by: 1 },
        );
    }

    #[test]
    fn output_filter_only_changes_presentation() {
        let settings = AllocatorSettings::new(0, 1).unwrap().with_output_filter(|raw: i64| format!("R{}", raw));
        assert_eq!(settings.present(4), "R4");
        assert_eq!(settings.next_after(4), Some(5));
    }
}
