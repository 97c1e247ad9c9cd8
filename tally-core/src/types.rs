use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity of one sequence: the owning model, the tracked field and the grouping value.
///
/// At most one [CounterRecord] exists per distinct key. An empty `group` means the
/// sequence is not grouped.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CounterKey {
    model: String,
    field: String,
    #[serde(default)]
    group: String,
}

impl CounterKey {
    /// Creates a key for one grouping value of a model's field.
    pub fn new<M, F, G>(model: M, field: F, group: G) -> Self
    where
        M: Into<String>,
        F: Into<String>,
        G: Into<String>,
    {
        CounterKey {
            model: model.into(),
            field: field.into(),
            group: group.into(),
        }
    }

    /// Creates a key for a model's field with no grouping.
    pub fn ungrouped<M: Into<String>, F: Into<String>>(model: M, field: F) -> Self {
        CounterKey::new(model, field, String::new())
    }

    /// The logical owner name.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The auto-assigned attribute.
    #[inline]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The grouping value; empty when ungrouped.
    #[inline]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Whether this key partitions its field's sequence.
    #[inline]
    pub fn is_grouped(&self) -> bool {
        !self.group.is_empty()
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.model, self.field)
        } else {
            write!(f, "{}/{}[{}]", self.model, self.field, self.group)
        }
    }
}

/// The persisted state of one counter.
///
/// `count` is the last assigned raw value, not the next one.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// The counter's identity.
    pub key: CounterKey,

    /// The last assigned value.
    pub count: i64,
}

/// The outcome of trying to materialize a counter record.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Created {
    /// This call inserted the record.
    Inserted,

    /// A record for the key already existed, most likely from a concurrent creator.
    Conflict,
}

/// The outcome of a compare-and-raise.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Raised {
    /// The stored count was behind the lower bound and has been raised.
    Updated,

    /// The stored count was already at or beyond the lower bound.
    NotApplied,
}

impl fmt::Display for Raised {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Raised::Updated => f.write_str("raised"),
            Raised::NotApplied => f.write_str("not applied"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ungrouped_key_has_an_empty_group() {
        let key = CounterKey::ungrouped("User", "_id");
        assert_eq!(key.group(), "");
        assert!(!key.is_grouped());
        assert_eq!(key, CounterKey::new("User", "_id", ""));
    }

    #[test]
    fn keys_differing_only_in_group_are_distinct() {
        let a = CounterKey::new("User", "userId", "Support");
        let b = CounterKey::new("User", "userId", "Marketing");
        assert_ne!(a, b);
    }

    #[test]
    fn key_display_includes_group_when_present() {
        assert_eq!(CounterKey::ungrouped("User", "_id").to_string(), "User/_id");
        assert_eq!(CounterKey::new("User", "userId", "Support").to_string(), "User/userId[Support]");
    }

    #[test]
    fn key_deserializes_without_a_group() {
        let key: CounterKey = serde_json::from_str(r#"{"model":"User","field":"_id"}"#).unwrap();
        assert_eq!(key, CounterKey::ungrouped("User", "_id"));
    }
}
