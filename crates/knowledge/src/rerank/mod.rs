//! Reranking adapters.
//!
//! A reranker scores `(query, candidate)` pairs. Scores are aligned to the
//! candidate slice; higher means more relevant.

pub mod http;
pub mod mock;

pub use http::HttpReranker;
pub use mock::TermOverlapReranker;

use async_trait::async_trait;
use docindex_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Supported reranking engines.
pub const RERANKING_ENGINES: &[&str] = &["none", "mock", "http"];

/// Trait for reranking backends.
#[async_trait]
pub trait Reranker: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// One relevance score per candidate, in candidate order.
    async fn rerank(&self, query: &str, candidates: &[String]) -> AppResult<Vec<f32>>;
}

/// Settings for the reranking function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankingConfig {
    /// "none", "mock" or "http"
    #[serde(default = "default_engine")]
    pub engine: String,

    #[serde(default)]
    pub model: String,

    /// Full URL of the rerank endpoint (http engine only)
    #[serde(default)]
    pub url: String,

    /// Environment variable holding the bearer token, if any
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_engine() -> String {
    "none".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RerankingConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            model: String::new(),
            url: String::new(),
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RerankingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> AppResult<()> {
        if !RERANKING_ENGINES.contains(&self.engine.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown reranking engine: '{}'. Supported engines: {}",
                self.engine,
                RERANKING_ENGINES.join(", ")
            )));
        }
        if self.engine == "http" && self.url.trim().is_empty() {
            return Err(AppError::Config(
                "Reranking engine 'http' requires a url".to_string(),
            ));
        }
        Ok(())
    }
}

/// Create the configured reranker, or `None` when reranking is disabled.
pub fn create_reranker(config: &RerankingConfig) -> AppResult<Option<Arc<dyn Reranker>>> {
    config.validate()?;

    match config.engine.as_str() {
        "mock" => Ok(Some(Arc::new(TermOverlapReranker))),
        "http" => {
            let api_key = config
                .api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok());
            Ok(Some(Arc::new(HttpReranker::new(config, api_key)?)))
        }
        _ => Ok(None),
    }
}
