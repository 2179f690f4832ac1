//! Embedding provider trait and factory.

use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::providers::{mock::MockProvider, ollama::OllamaProvider};
use async_trait::async_trait;
use docindex_core::AppResult;
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// One vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String], user: Option<&str>)
        -> AppResult<Vec<Vec<f32>>>;
}

/// Create an embedding provider based on configuration.
pub fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    config.validate()?;

    match config.engine.as_str() {
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        _ => Ok(Arc::new(MockProvider::new(&config.model, config.dimensions))),
    }
}
