//! Per-field configuration, validated when a sequence is registered.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_core::{AllocatorSettings, CounterKey};

/// The name of a record's primary identifier, the default tracked field.
pub const PRIMARY_KEY: &str = "_id";

/// The recognized options for an auto-assigned field.
///
/// Options are usually read from configuration; a bare string is shorthand for the
/// model name alone. Every option but `model` has a default.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldOptions {
    /// The logical owner name. Required.
    pub model: Option<String>,

    /// The auto-assigned attribute; the primary identifier when absent.
    pub field: Option<String>,

    /// The attribute whose value partitions the sequence.
    pub grouping_field: Option<String>,

    /// The first value returned.
    pub start_at: i64,

    /// The step size. Must be positive.
    pub increment_by: i64,

    /// Whether the owning collection should enforce uniqueness of the assigned value
    /// (within its group, when grouped).
    pub unique: bool,

    /// Whether a record's existing value is reconciled on every save rather than only
    /// when the field is empty.
    pub migrate: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        FieldOptions {
            model: None,
            field: None,
            grouping_field: None,
            start_at: 0,
            increment_by: 1,
            unique: true,
            migrate: false,
        }
    }
}

impl FieldOptions {
    /// Options for `model` with every other option defaulted.
    pub fn new<S: Into<String>>(model: S) -> Self {
        FieldOptions {
            model: Some(model.into()),
            ..FieldOptions::default()
        }
    }

    /// Reads options from a configuration value.
    ///
    /// A string names the model; an object is read option by option.
    pub fn from_value(value: Value) -> Result<Self, ConfigurationError> {
        match value {
            Value::String(model) => Ok(FieldOptions::from(model)),
            Value::Object(map) => {
                match map.get("model") {
                    Some(Value::String(_)) | Some(Value::Null) | None => {}
                    Some(_) => return Err(ConfigurationError::ModelNotString),
                }

                serde_json::from_value(Value::Object(map))
                    .map_err(|e| ConfigurationError::InvalidOptions(e.to_string()))
            }
            other => Err(ConfigurationError::InvalidOptions(format!(
                "expected a model name or an options object, got {}",
                other,
            ))),
        }
    }

    /// Tracks `field` instead of the primary identifier.
    pub fn with_field<S: Into<String>>(mut self, field: S) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Partitions the sequence by the value of `grouping_field`.
    pub fn with_grouping_field<S: Into<String>>(mut self, grouping_field: S) -> Self {
        self.grouping_field = Some(grouping_field.into());
        self
    }

    /// Sets the first value returned.
    pub fn with_start_at(mut self, start_at: i64) -> Self {
        self.start_at = start_at;
        self
    }

    /// Sets the step size.
    pub fn with_increment_by(mut self, increment_by: i64) -> Self {
        self.increment_by = increment_by;
        self
    }

    /// Sets whether the owning collection enforces uniqueness.
    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Sets whether existing values are reconciled on every save.
    pub fn with_migrate(mut self, migrate: bool) -> Self {
        self.migrate = migrate;
        self
    }

    /// Checks the options and resolves their defaults.
    pub fn validate(&self) -> Result<FieldConfig, ConfigurationError> {
        let model = match self.model {
            Some(ref model) if !model.is_empty() => model.to_owned(),
            _ => return Err(ConfigurationError::MissingModel),
        };

        let field = match self.field {
            Some(ref field) if !field.is_empty() => field.to_owned(),
            _ => PRIMARY_KEY.to_owned(),
        };

        let grouping_field = self.grouping_field.as_ref().filter(|g| !g.is_empty()).cloned();

        if let Some(ref grouping_field) = grouping_field {
            if field == PRIMARY_KEY {
                return Err(ConfigurationError::GroupingOnPrimaryKey {
                    grouping_field: grouping_field.to_owned(),
                });
            }
        }

        let settings = AllocatorSettings::new(self.start_at, self.increment_by)?;

        Ok(FieldConfig {
            model,
            field,
            grouping_field,
            unique: self.unique,
            migrate: self.migrate,
            settings,
        })
    }
}

impl<'a> From<&'a str> for FieldOptions {
    fn from(model: &'a str) -> Self {
        FieldOptions::new(model)
    }
}

impl From<String> for FieldOptions {
    fn from(model: String) -> Self {
        FieldOptions::new(model)
    }
}

/// The index the owning collection needs for an auto-assigned field.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct OwnerIndex {
    /// The indexed attributes, tracked field first.
    pub fields: Vec<String>,

    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

/// Validated, fully-resolved options for one auto-assigned field.
#[derive(Debug, Clone)]
pub struct FieldConfig {
    model: String,
    field: String,
    grouping_field: Option<String>,
    unique: bool,
    migrate: bool,
    settings: AllocatorSettings,
}

impl FieldConfig {
    /// The logical owner name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The auto-assigned attribute.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The attribute partitioning the sequence, if any.
    pub fn grouping_field(&self) -> Option<&str> {
        self.grouping_field.as_ref().map(String::as_str)
    }

    /// Whether the owning collection enforces uniqueness.
    pub fn unique(&self) -> bool {
        self.unique
    }

    /// Whether existing values are reconciled on every save.
    pub fn migrate(&self) -> bool {
        self.migrate
    }

    /// The sequence arithmetic.
    pub fn settings(&self) -> &AllocatorSettings {
        &self.settings
    }

    /// The counter key for a grouping value; `None` selects the ungrouped counter.
    pub fn key(&self, group: Option<&str>) -> CounterKey {
        CounterKey::new(self.model.as_str(), self.field.as_str(), group.unwrap_or_default())
    }

    /// The index the owning collection should carry for this field.
    pub fn index(&self) -> OwnerIndex {
        let mut fields = vec![self.field.to_owned()];
        fields.extend(self.grouping_field.iter().cloned());

        OwnerIndex {
            fields,
            unique: self.unique,
        }
    }
}
