use crate::{
    allocator::{Allocation, Allocator},
    error::Error,
    options::FieldConfig,
};
use serde_json::Value;
use std::fmt;
use tally_core::{AllocatorSettings, CounterKey, CounterStore, Identity, OutputFilter};

/// A registered auto-assigned field, bound to an allocator.
///
/// Every operation takes an optional grouping value; `None` selects the ungrouped
/// counter of the field.
pub struct Sequence<'a, S, F = Identity> {
    allocator: &'a Allocator<S>,
    config: FieldConfig,
    settings: AllocatorSettings<F>,
}

impl<'a, S, F> fmt::Debug for Sequence<'a, S, F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("config", &self.config)
            .field("settings", &self.settings)
            .finish()
    }
}

impl<'a, S, F> Sequence<'a, S, F>
where
    S: CounterStore,
    F: OutputFilter,
{
    pub(crate) fn new(allocator: &'a Allocator<S>, config: FieldConfig, output_filter: F) -> Self {
        let settings = config.settings().clone().with_output_filter(output_filter);
        Sequence {
            allocator,
            config,
            settings,
        }
    }

    /// The validated field configuration.
    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// The sequence arithmetic and output filter.
    pub fn settings(&self) -> &AllocatorSettings<F> {
        &self.settings
    }

    /// The counter key for a grouping value.
    pub fn key(&self, group: Option<&str>) -> CounterKey {
        self.config.key(group)
    }

    /// The raw value the next allocation would yield.
    pub fn peek(&self, group: Option<&str>) -> Result<i64, Error<S::Error>> {
        self.allocator.peek(&self.key(group), &self.settings)
    }

    /// Resets the counter so the next allocation yields `start_at`, which is returned.
    pub fn reset_count(&self, group: Option<&str>) -> Result<i64, Error<S::Error>> {
        self.allocator.reset_count(&self.key(group), &self.settings)
    }

    /// Claims the next value, or reconciles with a value the record already carries.
    pub fn allocate(&self, group: Option<&str>, supplied: Option<&Value>) -> Result<Allocation<F::Output>, Error<S::Error>> {
        self.allocator.allocate(&self.key(group), &self.settings, supplied)
    }
}
