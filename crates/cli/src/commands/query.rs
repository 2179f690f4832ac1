//! Query command.

use super::{open_service, print_json};
use clap::Args;
use docindex_core::{config::AppConfig, AppError, AppResult};
use docindex_knowledge::{Filter, GroupedResults, QueryOptions, QueryReport};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Args, Debug)]
pub struct QueryCommand {
    /// One or more query strings
    #[arg(required = true)]
    pub queries: Vec<String>,

    /// Collections to search (repeatable)
    #[arg(short, long = "collection", required = true)]
    pub collections: Vec<String>,

    /// Number of results to return
    #[arg(short)]
    pub k: Option<usize>,

    /// Candidates handed to the reranker in hybrid mode
    #[arg(long)]
    pub k_reranker: Option<usize>,

    /// Minimum reranker score kept in hybrid mode
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Metadata filter as key=value (repeatable; repeated keys match any value)
    #[arg(short, long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,

    /// Metadata filter as a JSON object (repeatable; objects are ORed, then
    /// ANDed with any --filter pairs)
    #[arg(long = "filter-json", value_name = "JSON")]
    pub filter_json: Vec<String>,

    /// Use hybrid (reranked) search
    #[arg(long, conflicts_with = "dense")]
    pub hybrid: bool,

    /// Force dense search even if hybrid is enabled in config
    #[arg(long)]
    pub dense: bool,

    /// User issuing the query
    #[arg(short, long)]
    pub user: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct FailureOutput {
    collection: Option<String>,
    query: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct QueryOutput {
    #[serde(flatten)]
    results: GroupedResults,
    failures: Vec<FailureOutput>,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = open_service(config)?;
        let options = QueryOptions {
            k: self.k,
            k_reranker: self.k_reranker,
            relevance_threshold: self.threshold,
            hybrid: self.mode(),
            filter: build_filter(&self.filters, &self.filter_json)?,
            user: self.user.clone(),
        };

        let report = match (self.collections.as_slice(), self.queries.as_slice()) {
            ([collection], [query]) => {
                service
                    .query_single_collection(collection, query, &options)
                    .await?
            }
            _ => {
                service
                    .query_multi_collection(&self.collections, &self.queries, &options)
                    .await?
            }
        };

        if report.is_partial() {
            tracing::warn!("{} query pairs failed", report.failures.len());
        }

        if self.json {
            return print_json(&output(&report));
        }

        if report.hits.is_empty() {
            println!("No results found.");
        }
        for (rank, hit) in report.hits.iter().enumerate() {
            let name = hit
                .metadata
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or(hit.id.as_str());
            println!("{}. [{:.3}] {} ({})", rank + 1, hit.score, name, hit.collection);
            println!("   {}", preview(&hit.text, 160));
        }
        for failure in &report.failures {
            println!(
                "failed: {} in {}: {}",
                failure.query,
                failure.collection.as_deref().unwrap_or("*"),
                failure.error
            );
        }
        Ok(())
    }

    fn mode(&self) -> Option<bool> {
        if self.hybrid {
            Some(true)
        } else if self.dense {
            Some(false)
        } else {
            None
        }
    }
}

fn output(report: &QueryReport) -> QueryOutput {
    QueryOutput {
        results: report.grouped(),
        failures: report
            .failures
            .iter()
            .map(|f| FailureOutput {
                collection: f.collection.clone(),
                query: f.query.clone(),
                error: f.error.user_message(),
            })
            .collect(),
    }
}

/// Combine `key=value` pairs with ORed JSON mappings.
fn build_filter(pairs: &[String], mappings: &[String]) -> AppResult<Option<Filter>> {
    let pairs = parse_filters(pairs)?;
    let mappings = parse_filter_json(mappings)?;
    Ok(match (pairs, mappings) {
        (Some(pairs), Some(mappings)) => Some(pairs.and(mappings)),
        (pairs, mappings) => pairs.or(mappings),
    })
}

/// Parse JSON objects such as `{"file_id": "abc"}` and OR them together.
fn parse_filter_json(mappings: &[String]) -> AppResult<Option<Filter>> {
    if mappings.is_empty() {
        return Ok(None);
    }

    let parsed = mappings
        .iter()
        .map(|raw| match serde_json::from_str::<Value>(raw)? {
            Value::Object(mapping) => Ok(mapping),
            _ => Err(AppError::Config(format!(
                "Invalid filter '{}': expected a JSON object",
                raw
            ))),
        })
        .collect::<AppResult<Vec<Map<String, Value>>>>()?;

    Filter::from_json_list(&parsed).map(Some)
}

/// Turn `key=value` pairs into a filter. Repeated keys become a membership test.
fn parse_filters(filters: &[String]) -> AppResult<Option<Filter>> {
    if filters.is_empty() {
        return Ok(None);
    }

    let mut mapping = Map::new();
    for raw in filters {
        let (key, value) = raw
            .split_once('=')
            .filter(|(key, _)| !key.trim().is_empty())
            .ok_or_else(|| AppError::Config(format!("Invalid filter '{}': expected KEY=VALUE", raw)))?;
        let value = Value::String(value.trim().to_string());

        match mapping.get_mut(key.trim()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                mapping.insert(key.trim().to_string(), value);
            }
        }
    }

    Filter::from_json(&mapping).map(Some)
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        format!("{}...", flat.chars().take(max_chars).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filters() {
        assert_eq!(parse_filters(&[]).unwrap(), None);

        let single = parse_filters(&["file_id=abc".to_string()]).unwrap();
        assert_eq!(single, Some(Filter::eq("file_id", "abc")));

        let repeated = parse_filters(&["name=a".to_string(), "name=b".to_string()])
            .unwrap()
            .unwrap();
        assert!(matches!(repeated, Filter::In(ref key, ref values) if key == "name" && values.len() == 2));

        assert!(parse_filters(&["novalue".to_string()]).is_err());
        assert!(parse_filters(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_filter_json_is_ored() {
        let filter = parse_filter_json(&[
            r#"{"file_id": "a"}"#.to_string(),
            r#"{"name": "b.txt"}"#.to_string(),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(
            filter,
            Filter::Or(vec![Filter::eq("file_id", "a"), Filter::eq("name", "b.txt")])
        );

        assert!(parse_filter_json(&["[1, 2]".to_string()]).is_err());
        assert!(parse_filter_json(&["not json".to_string()]).is_err());
    }

    #[test]
    fn test_pairs_and_json_combined() {
        let combined = build_filter(
            &["session_id=s".to_string()],
            &[r#"{"file_id": "a"}"#.to_string(), r#"{"file_id": "b"}"#.to_string()],
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            combined,
            Filter::And(vec![
                Filter::eq("session_id", "s"),
                Filter::Or(vec![Filter::eq("file_id", "a"), Filter::eq("file_id", "b")]),
            ])
        );

        assert_eq!(build_filter(&[], &[]).unwrap(), None);
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("a  b\nc", 10), "a b c");
        assert_eq!(preview("abcdef", 3), "abc...");
    }
}
