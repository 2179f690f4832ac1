//! Document ingestion and retrieval engine.
//!
//! Documents are split into chunks, deduplicated by content hash, embedded
//! and written to a vector store in load-sized batches under a concurrency
//! cap. Queries run dense or hybrid (reranked) search across one or many
//! collections and merge the results deterministically.
//!
//! [`service::RetrievalService`] wires the pieces together; every component is
//! also usable on its own.

pub mod batch;
pub mod chunk;
pub mod collections;
pub mod config;
pub mod dedup;
pub mod embeddings;
pub mod ingest;
pub mod insert;
pub mod load;
pub mod loader;
pub mod metadata;
pub mod rag;
pub mod rerank;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use batch::{BatchFile, BatchOrchestrator};
pub use config::{load_config, KnowledgeConfig, RetrievalConfig};
pub use embeddings::{EmbedPrefix, EmbeddingConfig, EmbeddingEngine, EmbeddingProvider};
pub use ingest::{Ingestor, MetadataSpec, SaveOptions, SaveOutcome};
pub use rag::{GroupedResults, QueryEngine, QueryFailure, QueryReport, SearchHit};
pub use rerank::{Reranker, RerankingConfig};
pub use service::{DocumentRequest, QueryOptions, RetrievalService};
pub use store::{Filter, InMemoryStore, SqliteStore, VectorStore};
pub use types::{
    BatchResponse, BatchResult, BatchStatus, Chunk, Document, ProcessResponse, VectorItem,
};
