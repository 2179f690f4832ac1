//! Metadata filter expressions.

use crate::metadata::{Metadata, MetadataValue};
use docindex_core::{AppError, AppResult};
use serde_json::{Map, Value};

/// A predicate over item metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every item
    All,
    /// `key == value`
    Eq(String, MetadataValue),
    /// `key` is one of `values`
    In(String, Vec<MetadataValue>),
    /// Every sub-filter matches
    And(Vec<Filter>),
    /// At least one sub-filter matches
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(key: &str, value: impl Into<MetadataValue>) -> Self {
        Filter::Eq(key.to_string(), value.into())
    }

    pub fn one_of<V: Into<MetadataValue>>(key: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(key.to_string(), values.into_iter().map(Into::into).collect())
    }

    /// OR the given filters together. An empty list matches everything.
    pub fn any_of(mut filters: Vec<Filter>) -> Self {
        match filters.len() {
            0 => Filter::All,
            1 => filters.remove(0),
            _ => Filter::Or(filters),
        }
    }

    /// AND two filters, collapsing [`Filter::All`].
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, g) => Filter::And(vec![f, g]),
        }
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(key, value) => metadata
                .get(key)
                .map(|v| v.loosely_equals(value))
                .unwrap_or(false),
            Filter::In(key, values) => metadata
                .get(key)
                .map(|v| values.iter().any(|candidate| v.loosely_equals(candidate)))
                .unwrap_or(false),
            Filter::And(filters) => filters.iter().all(|f| f.matches(metadata)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(metadata)),
        }
    }

    /// Parse a boundary mapping such as `{"file_id": "abc", "name": ["a", "b"]}`.
    ///
    /// Keys are ANDed; a list value means membership.
    pub fn from_json(mapping: &Map<String, Value>) -> AppResult<Self> {
        let mut clauses = Vec::with_capacity(mapping.len());

        for (key, value) in mapping {
            let clause = match value {
                Value::Array(values) => {
                    let parsed = values
                        .iter()
                        .map(|v| scalar(key, v))
                        .collect::<AppResult<Vec<_>>>()?;
                    Filter::In(key.clone(), parsed)
                }
                other => Filter::Eq(key.clone(), scalar(key, other)?),
            };
            clauses.push(clause);
        }

        Ok(match clauses.len() {
            0 => Filter::All,
            1 => clauses.remove(0),
            _ => Filter::And(clauses),
        })
    }

    /// Parse a list of mappings, ORed together.
    pub fn from_json_list(mappings: &[Map<String, Value>]) -> AppResult<Self> {
        let filters = mappings
            .iter()
            .map(Filter::from_json)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Filter::any_of(filters))
    }
}

fn scalar(key: &str, value: &Value) -> AppResult<MetadataValue> {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Null => Err(AppError::Config(format!(
            "Unsupported filter value for '{}': {}",
            key, value
        ))),
        other => MetadataValue::from_json(other)
            .ok_or_else(|| AppError::Config(format!("Unsupported filter value for '{}'", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(pairs: &[(&str, MetadataValue)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_eq_and_in() {
        let m = metadata(&[("file_id", "a".into()), ("page", 2i64.into())]);
        assert!(Filter::eq("file_id", "a").matches(&m));
        assert!(!Filter::eq("file_id", "b").matches(&m));
        assert!(Filter::one_of("page", [1i64, 2]).matches(&m));
        assert!(!Filter::eq("missing", "a").matches(&m));
    }

    #[test]
    fn test_from_json_mapping() {
        let mapping = json!({"file_id": "a", "page": [1, 2]});
        let filter = Filter::from_json(mapping.as_object().unwrap()).unwrap();

        let hit = metadata(&[("file_id", "a".into()), ("page", 2i64.into())]);
        let miss = metadata(&[("file_id", "a".into()), ("page", 3i64.into())]);
        assert!(filter.matches(&hit));
        assert!(!filter.matches(&miss));
    }

    #[test]
    fn test_from_json_list_is_ored() {
        let a = json!({"file_id": "a"});
        let b = json!({"file_id": "b"});
        let filter = Filter::from_json_list(&[
            a.as_object().cloned().unwrap(),
            b.as_object().cloned().unwrap(),
        ])
        .unwrap();

        assert!(filter.matches(&metadata(&[("file_id", "b".into())])));
        assert!(!filter.matches(&metadata(&[("file_id", "c".into())])));
    }

    #[test]
    fn test_empty_list_matches_all() {
        assert_eq!(Filter::from_json_list(&[]).unwrap(), Filter::All);
        assert!(Filter::All.matches(&Metadata::new()));
    }

    #[test]
    fn test_nested_value_rejected() {
        let mapping = json!({"owner": {"id": 1}});
        assert!(Filter::from_json(mapping.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_and_collapses_all() {
        let f = Filter::eq("a", "x");
        assert_eq!(Filter::All.and(f.clone()), f);
    }
}
