//! Embedding engine.
//!
//! Wraps an [`EmbeddingProvider`] with the behavior every caller relies on:
//! prefixes, newline flattening, request batching and per-request deadlines.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use docindex_core::{AppError, AppResult};
use std::sync::Arc;

/// Which configured prefix to prepend before embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedPrefix {
    Content,
    Query,
}

/// Provider plus the settings applied around each call.
#[derive(Debug, Clone)]
pub struct EmbeddingEngine {
    provider: Arc<dyn EmbeddingProvider>,
    config: EmbeddingConfig,
}

impl EmbeddingEngine {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingConfig) -> Self {
        Self { provider, config }
    }

    /// Build the configured provider.
    pub fn from_config(config: &EmbeddingConfig) -> AppResult<Self> {
        let provider = create_provider(config)?;
        tracing::debug!(
            "Embedding engine: provider={}, model={}, dimensions={}",
            provider.provider_name(),
            provider.model_name(),
            provider.dimensions()
        );
        Ok(Self::new(provider, config.clone()))
    }

    pub fn engine_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// One vector per text, in input order.
    pub async fn embed(
        &self,
        texts: &[String],
        prefix: EmbedPrefix,
        user: Option<&str>,
    ) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prefix_text = match prefix {
            EmbedPrefix::Content => self.config.content_prefix.as_deref(),
            EmbedPrefix::Query => self.config.query_prefix.as_deref(),
        }
        .unwrap_or("");

        let prepared: Vec<String> = texts
            .iter()
            .map(|text| format!("{}{}", prefix_text, text.replace('\n', " ")))
            .collect();

        let batch_size = self.config.batch_size.max(1);
        let deadline = self.config.timeout();
        let mut embeddings = Vec::with_capacity(prepared.len());

        for batch in prepared.chunks(batch_size) {
            let vectors = tokio::time::timeout(deadline, self.provider.embed_batch(batch, user))
                .await
                .map_err(|_| AppError::Timeout {
                    operation: "embedding".to_string(),
                    after: deadline,
                })??;

            if vectors.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "Provider '{}' returned {} embeddings for {} texts",
                    self.provider.provider_name(),
                    vectors.len(),
                    batch.len()
                )));
            }
            embeddings.extend(vectors);
        }

        tracing::debug!(
            "Embedded {} texts ({:?}) with {}",
            embeddings.len(),
            prefix,
            self.provider.model_name()
        );

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every batch it receives and returns `[len, 0]` per text.
    #[derive(Debug, Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<Vec<String>>>,
        drop_last: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingProvider {
        fn provider_name(&self) -> &str {
            "recording"
        }

        fn model_name(&self) -> &str {
            "recording-v1"
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn embed_batch(
            &self,
            texts: &[String],
            _user: Option<&str>,
        ) -> AppResult<Vec<Vec<f32>>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls.lock().unwrap().push(texts.to_vec());
            let mut out: Vec<Vec<f32>> = texts.iter().map(|t| vec![t.len() as f32, 0.0]).collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }
    }

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            batch_size: 2,
            content_prefix: Some("passage: ".to_string()),
            query_prefix: Some("query: ".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_prefix_newlines_and_batching() {
        let provider = Arc::new(RecordingProvider::default());
        let engine = EmbeddingEngine::new(provider.clone(), config());
        let texts = vec!["a\nb".to_string(), "c".to_string(), "d".to_string()];

        let vectors = engine.embed(&texts, EmbedPrefix::Content, None).await.unwrap();
        assert_eq!(vectors.len(), 3);

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], vec!["passage: a b".to_string(), "passage: c".to_string()]);
        assert_eq!(calls[1], vec!["passage: d".to_string()]);
    }

    #[tokio::test]
    async fn test_query_prefix() {
        let provider = Arc::new(RecordingProvider::default());
        let engine = EmbeddingEngine::new(provider.clone(), config());

        engine
            .embed(&["what".to_string()], EmbedPrefix::Query, Some("u1"))
            .await
            .unwrap();
        assert_eq!(provider.calls.lock().unwrap()[0], vec!["query: what".to_string()]);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_error() {
        let provider = Arc::new(RecordingProvider {
            drop_last: true,
            ..Default::default()
        });
        let engine = EmbeddingEngine::new(provider, config());

        let result = engine.embed(&["x".to_string()], EmbedPrefix::Content, None).await;
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let provider = Arc::new(RecordingProvider {
            delay: Some(Duration::from_secs(120)),
            ..Default::default()
        });
        let engine = EmbeddingEngine::new(provider, config());

        let result = engine.embed(&["x".to_string()], EmbedPrefix::Content, None).await;
        assert!(matches!(result, Err(AppError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_empty_input_skips_provider() {
        let provider = Arc::new(RecordingProvider::default());
        let engine = EmbeddingEngine::new(provider.clone(), config());

        assert!(engine.embed(&[], EmbedPrefix::Content, None).await.unwrap().is_empty());
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_from_config_defaults_to_mock() {
        let engine = EmbeddingEngine::from_config(&EmbeddingConfig::default()).unwrap();
        assert_eq!(engine.engine_name(), "mock");
        assert_eq!(engine.model_name(), "hashing-v1");
    }
}
