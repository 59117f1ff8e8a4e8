//! Metadata maps for graph records
//!
//! String-keyed maps attached to entities, relations and observations.
//! The bridge uses them to carry causal-scoring breakdowns for
//! explainability.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    /// Null/missing value
    Null,

    /// Boolean value
    Bool(bool),

    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit floating point
    Float(f64),

    /// UTF-8 string
    String(String),

    /// List of metadata values
    List(Vec<MetadataValue>),

    /// Nested map
    Map(HashMap<String, MetadataValue>),
}

impl MetadataValue {
    /// Try to get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as float (integers widen)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(f) => Some(*f),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            MetadataValue::Null => "null",
            MetadataValue::Bool(_) => "bool",
            MetadataValue::Integer(_) => "integer",
            MetadataValue::Float(_) => "float",
            MetadataValue::String(_) => "string",
            MetadataValue::List(_) => "list",
            MetadataValue::Map(_) => "map",
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::String(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::String(v)
    }
}

/// A string-keyed metadata map
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    values: HashMap<String, MetadataValue>,
}

impl Metadata {
    /// Create an empty metadata map
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value
    pub fn set<K: Into<String>, V: Into<MetadataValue>>(&mut self, key: K, value: V) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style set
    pub fn with<K: Into<String>, V: Into<MetadataValue>>(mut self, key: K, value: V) -> Self {
        self.set(key, value);
        self
    }

    /// Get a value
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.values.get(key)
    }

    /// Remove a value
    pub fn remove(&mut self, key: &str) -> Option<MetadataValue> {
        self.values.remove(key)
    }

    /// Check for a key
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Merge another map into this one, overwriting existing keys
    pub fn merge(&mut self, other: &Metadata) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }

    /// Iterate over entries
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.values.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_set_get() {
        let mut meta = Metadata::new();
        meta.set("source", "extractor");
        meta.set("confidence", 0.8);

        assert_eq!(meta.get("source").and_then(|v| v.as_str()), Some("extractor"));
        assert_eq!(meta.get("confidence").and_then(|v| v.as_float()), Some(0.8));
        assert!(meta.get("missing").is_none());
    }

    #[test]
    fn test_metadata_builder() {
        let meta = Metadata::new()
            .with("temporal_score", 0.8)
            .with("same_session", true);

        assert_eq!(meta.len(), 2);
        assert_eq!(meta.get("same_session").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn test_metadata_merge() {
        let mut a = Metadata::new().with("k1", 1i64).with("k2", 2i64);
        let b = Metadata::new().with("k2", 20i64).with("k3", 3i64);

        a.merge(&b);

        assert_eq!(a.get("k1").and_then(|v| v.as_integer()), Some(1));
        assert_eq!(a.get("k2").and_then(|v| v.as_integer()), Some(20));
        assert_eq!(a.get("k3").and_then(|v| v.as_integer()), Some(3));
    }

    #[test]
    fn test_integer_widens_to_float() {
        let meta = Metadata::new().with("n", 3i64);
        assert_eq!(meta.get("n").and_then(|v| v.as_float()), Some(3.0));
    }

    #[test]
    fn test_json_roundtrip() {
        let meta = Metadata::new()
            .with("causality_type", "code_change_effect")
            .with("code_signal_score", 0.9)
            .with("same_session", true);

        let json = serde_json::to_string(&meta).unwrap();
        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }
}
