//! Query result types.

use crate::metadata::{self, Metadata};
use docindex_core::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single retrieved chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    /// Collection the chunk was found in
    pub collection: String,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine similarity for dense search, reranker score for hybrid search
    pub score: f32,
}

/// A (collection, query) pair that could not be answered.
///
/// `collection` is `None` when the query itself failed (embedding), which
/// affects every collection it was sent to.
#[derive(Debug)]
pub struct QueryFailure {
    pub collection: Option<String>,
    pub query: String,
    pub error: AppError,
}

/// Merged hits plus every failure, so "no matches" and "query failed" stay
/// distinguishable.
#[derive(Debug, Default)]
pub struct QueryReport {
    pub hits: Vec<SearchHit>,
    pub failures: Vec<QueryFailure>,
}

/// Grouped wire shape: the outer vectors index query groups (always one here).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedResults {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<Map<String, Value>>>,
    pub distances: Vec<Vec<f32>>,
}

impl QueryReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Render the merged hits as a single group.
    pub fn grouped(&self) -> GroupedResults {
        GroupedResults {
            ids: vec![self.hits.iter().map(|h| h.id.clone()).collect()],
            documents: vec![self.hits.iter().map(|h| h.text.clone()).collect()],
            metadatas: vec![self
                .hits
                .iter()
                .map(|h| metadata::to_json_map(&h.metadata))
                .collect()],
            distances: vec![self.hits.iter().map(|h| h.score).collect()],
        }
    }
}
