//! State Records
//!
//! A StateRecord is the open-shape mapping a store owns: field name to
//! [`Value`]. There is no schema; any field can hold any kind, and writes may
//! introduce field names the record did not start with.
//!
//! # Replacement, Not Mutation
//!
//! Records are updated by whole-record replacement: [`StateRecord::merged`]
//! builds a new record equal to the old one with the partial's keys
//! overwritten. Fields absent from the partial keep both their value and
//! their identity, so downstream change detection can compare field-by-field
//! with [`Value::same`] and whole-record with `Arc::ptr_eq`.
//!
//! Keys are `Arc<str>` and values are cheap to clone, so the shallow copy
//! performed on every write costs refcount bumps, not deep copies.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::value::Value;

/// An open-shape state record: field name to value.
///
/// Iteration yields fields in insertion order (an `IndexMap` property), but
/// no contract in this crate depends on that order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateRecord {
    fields: IndexMap<Arc<str>, Value>,
}

impl StateRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
        }
    }

    /// Number of fields in the record.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Check whether a field is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Insert or overwrite a field.
    pub fn insert(&mut self, key: impl Into<Arc<str>>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Builder form of [`StateRecord::insert`].
    pub fn with(mut self, key: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Iterate over field names.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.keys().map(|key| key.as_ref())
    }

    /// Iterate over fields. The key is exposed as the shared `Arc<str>` so
    /// callers building derived records can keep key identity.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> + '_ {
        self.fields.iter()
    }

    /// Shallow merge: a new record equal to `self` with the keys of
    /// `partial` overwritten. All other fields keep value and identity.
    pub fn merged(&self, partial: &StateRecord) -> StateRecord {
        let mut next = self.clone();
        for (key, value) in partial.iter() {
            next.fields.insert(Arc::clone(key), value.clone());
        }
        next
    }

    /// Build a record restricted to the listed field names, skipping names
    /// that are absent. The usual way to write a picker.
    pub fn select(&self, keys: &[&str]) -> StateRecord {
        let mut selected = StateRecord::new();
        for key in keys {
            if let Some((key, value)) = self.fields.get_key_value(*key) {
                selected.fields.insert(Arc::clone(key), value.clone());
            }
        }
        selected
    }
}

impl<K, V> FromIterator<(K, V)> for StateRecord
where
    K: Into<Arc<str>>,
    V: Into<Value>,
{
    fn from_iter<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = StateRecord::new();
        for (key, value) in entries {
            record.insert(key, value);
        }
        record
    }
}

impl fmt::Display for StateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            map.entry(&key.as_ref(), value);
        }
        map.finish()
    }
}

impl Serialize for StateRecord {
    /// Diagnostic serialization as a JSON-style map, in field order.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key.as_ref(), value)?;
        }
        map.end()
    }
}

/// Build a [`StateRecord`] from field literals.
///
/// ```rust,ignore
/// let state = record! {
///     "count" => 0,
///     "name" => "x",
/// };
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::store::StateRecord::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::store::StateRecord::new();
        $(record.insert($key, $crate::store::Value::from($value));)+
        record
    }};
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn record_macro_builds_fields_in_order() {
        let record = record! {
            "count" => 0,
            "name" => "x",
            "ratio" => 0.5,
        };

        assert_eq!(record.len(), 3);
        assert_eq!(record.get("count"), Some(&Value::Int(0)));
        assert_eq!(record.get("name").and_then(Value::as_str), Some("x"));
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["count", "name", "ratio"]);
    }

    #[test]
    fn merged_overwrites_only_partial_keys() {
        let base = record! { "a" => 1, "b" => 2, "c" => 3 };
        let next = base.merged(&record! { "b" => 20 });

        assert_eq!(next.get("a"), Some(&Value::Int(1)));
        assert_eq!(next.get("b"), Some(&Value::Int(20)));
        assert_eq!(next.get("c"), Some(&Value::Int(3)));
        // The base record is untouched.
        assert_eq!(base.get("b"), Some(&Value::Int(2)));
    }

    #[test]
    fn merged_preserves_identity_of_untouched_fields() {
        let shared = Value::shared(vec![1, 2, 3]);
        let base = StateRecord::new()
            .with("obj", shared.clone())
            .with("count", 0);

        let next = base.merged(&record! { "count" => 1 });

        // Same allocation survives the shallow copy.
        assert!(next.get("obj").unwrap().same(&shared));
    }

    #[test]
    fn merged_adds_unknown_keys() {
        let base = record! { "a" => 1 };
        let next = base.merged(&record! { "z" => 99 });

        assert_eq!(next.len(), 2);
        assert_eq!(next.get("z"), Some(&Value::Int(99)));
    }

    #[test]
    fn select_picks_present_fields_and_skips_absent() {
        let record = record! { "a" => 1, "b" => 2, "c" => 3 };
        let picked = record.select(&["a", "c", "missing"]);

        assert_eq!(picked.len(), 2);
        assert_eq!(picked.get("a"), Some(&Value::Int(1)));
        assert_eq!(picked.get("c"), Some(&Value::Int(3)));
        assert!(!picked.contains_key("missing"));
    }

    #[test]
    fn from_iterator_collects_fields() {
        let record: StateRecord = [("x", 1), ("y", 2)].into_iter().collect();

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("y"), Some(&Value::Int(2)));
    }

    #[test]
    fn serializes_as_a_map() {
        let record = record! { "count" => 1, "name" => "x" };

        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"count":1,"name":"x"}"#
        );
    }
}
