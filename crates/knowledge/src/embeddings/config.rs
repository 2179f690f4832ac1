//! Embedding configuration.

use docindex_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Supported embedding engines.
pub const EMBEDDING_ENGINES: &[&str] = &["mock", "ollama"];

/// Settings for the embedding function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Engine name: "mock" or "ollama"
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Model identifier (engine-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Base URL of the embedding service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Texts per embedding request (independent of the insertion batch size)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Deadline for a single embedding request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Prepended to every chunk text before embedding
    #[serde(default)]
    pub content_prefix: Option<String>,

    /// Prepended to every query before embedding
    #[serde(default)]
    pub query_prefix: Option<String>,
}

fn default_engine() -> String {
    "mock".to_string()
}

fn default_model() -> String {
    "hashing-v1".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            model: default_model(),
            dimensions: default_dimensions(),
            base_url: default_base_url(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            content_prefix: None,
            query_prefix: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> AppResult<()> {
        if !EMBEDDING_ENGINES.contains(&self.engine.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding engine: '{}'. Supported engines: {}",
                self.engine,
                EMBEDDING_ENGINES.join(", ")
            )));
        }
        if self.model.trim().is_empty() {
            return Err(AppError::Config("Embedding model is required".to_string()));
        }
        if self.dimensions == 0 || self.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding dimensions and batch_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.engine, "mock");
        assert_eq!(config.dimensions, 384);
        assert_eq!(config.batch_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_engine() {
        let config = EmbeddingConfig {
            engine: "openai".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Unknown embedding engine"));
    }

    #[test]
    fn test_missing_model() {
        let config = EmbeddingConfig {
            model: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_yaml_defaults_fill_gaps() {
        let config: EmbeddingConfig =
            serde_yaml::from_str("engine: ollama\nmodel: nomic-embed-text\ndimensions: 768\n")
                .unwrap();
        assert_eq!(config.engine, "ollama");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.base_url, "http://localhost:11434");
    }
}
