//! Retrieval over one or many collections.
//!
//! Dense search embeds each query and asks the store for its nearest
//! neighbours; hybrid search additionally reranks a larger candidate set and
//! applies a relevance threshold. Results from every (query, collection) pair
//! are pooled, deduplicated by id and sorted by score.

pub mod search;
pub mod types;

pub use search::QueryEngine;
pub use types::{GroupedResults, QueryFailure, QueryReport, SearchHit};
