//! Engine configuration management.
//!
//! Reads the `retrieval`, `embedding` and `reranking` sections of
//! `.docindex/config.yaml`. Missing sections and fields fall back to defaults;
//! environment variables override the file.

use crate::chunk::{SplitterKind, TokenizerKind};
use crate::dedup::BatchDuplicatePolicy;
use crate::embeddings::EmbeddingConfig;
use crate::rerank::RerankingConfig;
use docindex_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Largest accepted `max_batch_size`.
pub const MAX_BATCH_SIZE_LIMIT: usize = 100_000;

/// Settings for splitting, insertion and querying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Splitting strategy: "character" (or empty) or "token"
    #[serde(default = "default_text_splitter")]
    pub text_splitter: String,

    /// Window size, in characters or tokens depending on the splitter
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive windows
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Token counter used by the token splitter
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,

    /// Results returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Dense candidates handed to the reranker
    #[serde(default = "default_top_k")]
    pub top_k_reranker: usize,

    /// Minimum reranker score kept by hybrid search
    #[serde(default)]
    pub relevance_threshold: f32,

    #[serde(default)]
    pub enable_hybrid_search: bool,

    /// Insertion batch size under low load
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Insertion batch size under high load
    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: usize,

    /// Hard cap on simultaneous vector store writes
    #[serde(default = "default_max_concurrent_inserts")]
    pub max_concurrent_inserts: usize,

    #[serde(default = "default_insert_timeout_secs")]
    pub insert_timeout_secs: u64,

    /// Deadline for every store call other than insert
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,

    /// Extra attempts for a failed insertion batch
    #[serde(default)]
    pub insert_retries: u32,

    #[serde(default)]
    pub batch_duplicate_policy: BatchDuplicatePolicy,
}

fn default_text_splitter() -> String {
    "character".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_tokenizer() -> String {
    "approx".to_string()
}

fn default_top_k() -> usize {
    3
}

fn default_max_batch_size() -> usize {
    1000
}

fn default_min_batch_size() -> usize {
    10
}

fn default_max_concurrent_inserts() -> usize {
    5
}

fn default_insert_timeout_secs() -> u64 {
    60
}

fn default_store_timeout_secs() -> u64 {
    30
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            text_splitter: default_text_splitter(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            tokenizer: default_tokenizer(),
            top_k: default_top_k(),
            top_k_reranker: default_top_k(),
            relevance_threshold: 0.0,
            enable_hybrid_search: false,
            max_batch_size: default_max_batch_size(),
            min_batch_size: default_min_batch_size(),
            max_concurrent_inserts: default_max_concurrent_inserts(),
            insert_timeout_secs: default_insert_timeout_secs(),
            store_timeout_secs: default_store_timeout_secs(),
            insert_retries: 0,
            batch_duplicate_policy: BatchDuplicatePolicy::default(),
        }
    }
}

impl RetrievalConfig {
    pub fn splitter_kind(&self) -> AppResult<SplitterKind> {
        SplitterKind::parse(&self.text_splitter)
    }

    pub fn tokenizer_kind(&self) -> AppResult<TokenizerKind> {
        TokenizerKind::parse(&self.tokenizer)
    }

    pub fn insert_timeout(&self) -> Duration {
        Duration::from_secs(self.insert_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        self.splitter_kind()?;
        self.tokenizer_kind()?;

        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be greater than 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.min_batch_size == 0 || self.min_batch_size > self.max_batch_size {
            return Err(AppError::Config(format!(
                "Invalid batch size bounds: min {} / max {}",
                self.min_batch_size, self.max_batch_size
            )));
        }
        if self.max_batch_size > MAX_BATCH_SIZE_LIMIT {
            return Err(AppError::Config(format!(
                "max_batch_size ({}) exceeds the limit of {}",
                self.max_batch_size, MAX_BATCH_SIZE_LIMIT
            )));
        }
        if self.insert_timeout_secs == 0 || self.store_timeout_secs == 0 {
            return Err(AppError::Config(
                "insert_timeout_secs and store_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_inserts == 0 {
            return Err(AppError::Config(
                "max_concurrent_inserts must be at least 1".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(AppError::Config("top_k must be at least 1".to_string()));
        }

        Ok(())
    }
}

/// All engine settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub reranking: RerankingConfig,
}

impl KnowledgeConfig {
    /// Apply environment overrides through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(splitter) = lookup("DOCINDEX_TEXT_SPLITTER") {
            self.retrieval.text_splitter = splitter;
        }
        if let Some(size) = lookup("DOCINDEX_CHUNK_SIZE") {
            self.retrieval.chunk_size = parse_env("DOCINDEX_CHUNK_SIZE", &size)?;
        }
        if let Some(overlap) = lookup("DOCINDEX_CHUNK_OVERLAP") {
            self.retrieval.chunk_overlap = parse_env("DOCINDEX_CHUNK_OVERLAP", &overlap)?;
        }
        if let Some(top_k) = lookup("DOCINDEX_TOP_K") {
            self.retrieval.top_k = parse_env("DOCINDEX_TOP_K", &top_k)?;
        }
        if let Some(secs) = lookup("DOCINDEX_STORE_TIMEOUT_SECS") {
            self.retrieval.store_timeout_secs = parse_env("DOCINDEX_STORE_TIMEOUT_SECS", &secs)?;
        }
        if let Some(engine) = lookup("DOCINDEX_EMBEDDING_ENGINE") {
            self.embedding.engine = engine;
        }
        if let Some(model) = lookup("DOCINDEX_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.embedding.base_url = url;
        }
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        self.retrieval.validate()?;
        self.embedding.validate()?;
        self.reranking.validate()
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> AppResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("Invalid value for {}: {:?}", name, value)))
}

/// Load engine configuration from `path`, then apply environment overrides.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> AppResult<KnowledgeConfig> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", path, e))
        })?;

        if content.trim().is_empty() {
            KnowledgeConfig::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                AppError::Config(format!("Failed to parse config at {:?}: {}", path, e))
            })?
        }
    } else {
        tracing::debug!("No config file at {:?}, using engine defaults", path);
        KnowledgeConfig::default()
    };

    config.apply_env_with(|name| std::env::var(name).ok())?;
    config.validate()?;

    Ok(config)
}
