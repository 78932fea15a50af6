//! Structured metadata attached to log records
//!
//! `Metadata` is an insertion-ordered map of JSON values. Loggers merge their
//! static context with call-site metadata; enrichers extend it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    fields: Map<String, Value>,
}

impl Metadata {
    /// Create new empty metadata
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Add a field (builder style)
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add a field (mutable version)
    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Get all fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if metadata has any fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy every field of `other` into `self`; `other` wins on conflicts
    pub fn extend(&mut self, other: &Metadata) {
        for (key, value) in &other.fields {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// New map holding `self` overlaid with `other`
    #[must_use]
    pub fn merged(&self, other: &Metadata) -> Metadata {
        let mut merged = self.clone();
        merged.extend(other);
        merged
    }

    /// Format fields as key=value pairs
    pub fn format_fields(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{}={}", k, s),
                other => format!("{}={}", k, other),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_fields())
    }
}

impl From<Map<String, Value>> for Metadata {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl TryFrom<Value> for Metadata {
    type Error = Value;

    /// Accepts JSON objects; any other value is handed back
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_creation() {
        let metadata = Metadata::new();
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_metadata_with_fields() {
        let metadata = Metadata::new()
            .with_field("user_id", 123)
            .with_field("username", "john_doe")
            .with_field("active", true);

        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata.get("user_id"), Some(&json!(123)));
    }

    #[test]
    fn test_metadata_preserves_insertion_order() {
        let metadata = Metadata::new()
            .with_field("zeta", 1)
            .with_field("alpha", 2)
            .with_field("mid", 3);

        let keys: Vec<&String> = metadata.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_merged_later_wins() {
        let context = Metadata::new().with_field("key", "context").with_field("app", "api");
        let call_site = Metadata::new().with_field("key", "call_site");

        let merged = context.merged(&call_site);
        assert_eq!(merged.get("key"), Some(&json!("call_site")));
        assert_eq!(merged.get("app"), Some(&json!("api")));
        assert_eq!(context.get("key"), Some(&json!("context")));
    }

    #[test]
    fn test_format_fields() {
        let metadata = Metadata::new().with_field("key1", "value1").with_field("key2", 42);
        assert_eq!(metadata.format_fields(), "key1=value1 key2=42");
    }

    #[test]
    fn test_try_from_json() {
        let metadata = Metadata::try_from(json!({"a": 1, "b": "two"})).unwrap();
        assert_eq!(metadata.len(), 2);
        assert!(Metadata::try_from(json!([1, 2])).is_err());
    }
}
