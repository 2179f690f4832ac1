//! Vector store gateway.
//!
//! A narrow, backend-agnostic contract over a vector backend. The rest of the
//! engine talks to `dyn VectorStore` only and never branches on the backend.
//!
//! Semantics every backend upholds:
//! - collections are created implicitly by the first insert
//! - all vectors of a collection share one dimension
//! - `insert` is idempotent by item id (upsert), and a batch is all-or-nothing
//! - querying or searching a missing collection yields an empty result
//! - deleting from a missing collection is a no-op

mod filter;
pub mod memory;
pub mod sqlite;

pub use filter::Filter;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::types::{QueryResult, SearchResult, VectorItem};
use async_trait::async_trait;
use docindex_core::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;

/// Deadline for store reads and maintenance calls when none is configured.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for vector store backends.
#[async_trait]
pub trait VectorStore: Send + Sync + std::fmt::Debug {
    /// Backend name (e.g., "memory", "sqlite")
    fn backend_name(&self) -> &str;

    /// Cheap existence check.
    async fn has_collection(&self, collection: &str) -> AppResult<bool>;

    /// Write one batch of items.
    async fn insert(&self, collection: &str, items: &[VectorItem]) -> AppResult<()>;

    /// Items whose metadata matches `filter`, in insertion order, as a single group.
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> AppResult<QueryResult>;

    /// Top-`limit` nearest items per query vector, one group per vector.
    async fn search(
        &self,
        collection: &str,
        vectors: &[Vec<f32>],
        limit: usize,
        filter: Option<&Filter>,
    ) -> AppResult<SearchResult>;

    /// Remove matching items. Returns how many were removed.
    async fn delete(&self, collection: &str, filter: &Filter) -> AppResult<usize>;

    async fn delete_collection(&self, collection: &str) -> AppResult<()>;

    /// Drop every collection.
    async fn reset(&self) -> AppResult<()>;

    /// Whether `search` applies its filter before ranking.
    fn supports_prefilter(&self) -> bool {
        true
    }
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Score `candidates` against `query` and keep the best `limit`.
///
/// The sort is stable, so equal scores keep candidate order.
pub(crate) fn rank<'a, I>(query: &[f32], candidates: I, limit: usize) -> Vec<(VectorItem, f32)>
where
    I: IntoIterator<Item = &'a VectorItem>,
{
    let mut scored: Vec<(VectorItem, f32)> = candidates
        .into_iter()
        .map(|item| (item.clone(), cosine_similarity(query, &item.vector)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(limit);
    scored
}

/// Await a store call, failing with [`AppError::Timeout`] once `after` elapses.
pub async fn with_timeout<T, F>(operation: &str, after: Duration, call: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            operation: operation.to_string(),
            after,
        }),
    }
}

/// Reject query vectors whose dimension differs from the collection's.
pub(crate) fn check_query_dimension(collection: &str, query: &[f32], dimension: usize) -> AppResult<()> {
    if query.len() != dimension {
        return Err(AppError::VectorStore(format!(
            "Query dimension {} does not match collection '{}' dimension {}",
            query.len(),
            collection,
            dimension
        )));
    }
    Ok(())
}

/// Check that a batch has one shared dimension matching `expected` (if known).
pub(crate) fn batch_dimension(items: &[VectorItem], expected: Option<usize>) -> AppResult<usize> {
    let dimension = match expected.or_else(|| items.first().map(|i| i.vector.len())) {
        Some(d) => d,
        None => return Ok(0),
    };

    if dimension == 0 {
        return Err(AppError::VectorStore("Cannot store empty vectors".to_string()));
    }

    if let Some(bad) = items.iter().find(|i| i.vector.len() != dimension) {
        return Err(AppError::VectorStore(format!(
            "Dimension mismatch for item {}: expected {}, got {}",
            bad.id,
            dimension,
            bad.vector.len()
        )));
    }

    Ok(dimension)
}
