//! Typed metadata values and the normalization step applied before persistence.
//!
//! Loaders hand over arbitrary JSON metadata. Vector stores only accept flat
//! scalar values, so every mapping goes through [`normalize`] before it is
//! attached to a [`crate::types::VectorItem`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata key holding the content hash of the parent document.
pub const HASH_KEY: &str = "hash";

/// Metadata key holding the originating file id.
pub const FILE_ID_KEY: &str = "file_id";

/// Metadata key holding the embedding engine/model used for the vector.
pub const EMBEDDING_CONFIG_KEY: &str = "embedding_config";

/// Metadata key holding the byte offset of a chunk inside its document.
pub const START_INDEX_KEY: &str = "start_index";

/// A single persisted metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Flat, ordered metadata mapping as stored next to a vector.
pub type Metadata = BTreeMap<String, MetadataValue>;

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Equality that treats `Int(1)` and `Float(1.0)` as the same value.
    pub fn loosely_equals(&self, other: &MetadataValue) -> bool {
        match (self, other) {
            (MetadataValue::Int(a), MetadataValue::Float(b))
            | (MetadataValue::Float(b), MetadataValue::Int(a)) => (*a as f64) == *b,
            _ => self == other,
        }
    }

    /// Convert a JSON value. `null` has no representation and yields `None`;
    /// arrays and objects are stored as their JSON text.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(MetadataValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(MetadataValue::Int(i)),
                None => n.as_f64().map(MetadataValue::Float),
            },
            Value::String(s) => Some(MetadataValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Some(MetadataValue::Text(value.to_string())),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            MetadataValue::Bool(b) => Value::Bool(*b),
            MetadataValue::Int(i) => Value::from(*i),
            MetadataValue::Float(f) => Value::from(*f),
            MetadataValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Int(i) => write!(f, "{}", i),
            MetadataValue::Float(x) => write!(f, "{}", x),
            MetadataValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        MetadataValue::Int(value as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for MetadataValue {
    fn from(value: DateTime<Utc>) -> Self {
        MetadataValue::Text(value.to_rfc3339())
    }
}

/// Normalize a loader-supplied JSON mapping into persistable metadata.
///
/// Null values are dropped. Nested arrays and objects become JSON strings.
pub fn normalize(raw: &Map<String, Value>) -> Metadata {
    raw.iter()
        .filter_map(|(key, value)| MetadataValue::from_json(value).map(|v| (key.clone(), v)))
        .collect()
}

/// Overlay `extra` on top of `base`; keys in `extra` win.
pub fn merge(base: &Metadata, extra: &Metadata) -> Metadata {
    let mut merged = base.clone();
    for (key, value) in extra {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Render metadata back into a JSON object.
pub fn to_json_map(metadata: &Metadata) -> Map<String, Value> {
    metadata
        .iter()
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect()
}

/// SHA-256 hex digest of a document's full text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Value stored under [`EMBEDDING_CONFIG_KEY`].
pub fn embedding_config_value(engine: &str, model: &str) -> MetadataValue {
    MetadataValue::Text(serde_json::json!({ "engine": engine, "model": model }).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_normalize_drops_nulls_and_flattens() {
        let raw = json!({
            "name": "report.txt",
            "page": 3,
            "score": 0.5,
            "draft": false,
            "missing": null,
            "tags": ["a", "b"],
            "owner": {"id": 7}
        });
        let metadata = normalize(raw.as_object().unwrap());

        assert!(!metadata.contains_key("missing"));
        assert_eq!(metadata["name"], MetadataValue::Text("report.txt".into()));
        assert_eq!(metadata["page"], MetadataValue::Int(3));
        assert_eq!(metadata["score"], MetadataValue::Float(0.5));
        assert_eq!(metadata["draft"], MetadataValue::Bool(false));
        assert_eq!(metadata["tags"], MetadataValue::Text(r#"["a","b"]"#.into()));
        assert_eq!(metadata["owner"], MetadataValue::Text(r#"{"id":7}"#.into()));
    }

    #[test]
    fn test_datetime_becomes_text() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let value = MetadataValue::from(at);
        assert_eq!(value.as_str(), Some("2024-05-01T12:00:00+00:00"));
    }

    #[test]
    fn test_merge_prefers_extra() {
        let mut base = Metadata::new();
        base.insert("name".into(), "a".into());
        base.insert("page".into(), 1i64.into());
        let mut extra = Metadata::new();
        extra.insert("name".into(), "b".into());

        let merged = merge(&base, &extra);
        assert_eq!(merged["name"].as_str(), Some("b"));
        assert_eq!(merged["page"].as_i64(), Some(1));
    }

    #[test]
    fn test_content_hash() {
        let hash = content_hash("Hello, world!");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash("Hello, world!"));
        assert_ne!(hash, content_hash("Different text"));
    }

    #[test]
    fn test_loose_numeric_equality() {
        assert!(MetadataValue::Int(2).loosely_equals(&MetadataValue::Float(2.0)));
        assert!(!MetadataValue::Int(2).loosely_equals(&MetadataValue::Text("2".into())));
    }

    #[test]
    fn test_embedding_config_value() {
        let value = embedding_config_value("ollama", "nomic-embed-text");
        let parsed: Value = serde_json::from_str(value.as_str().unwrap()).unwrap();
        assert_eq!(parsed["engine"], "ollama");
        assert_eq!(parsed["model"], "nomic-embed-text");
    }
}
