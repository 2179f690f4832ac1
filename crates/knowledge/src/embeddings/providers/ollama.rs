//! Ollama embedding provider.
//!
//! Calls the local `/api/embed` endpoint, which accepts a batch of inputs and
//! returns one embedding per input in order.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use async_trait::async_trait;
use docindex_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const EMBED_ENDPOINT: &str = "/api/embed";

/// Ollama embedding provider using local API
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

/// Request payload for the Ollama embed API
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response from the Ollama embed API
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Error response from Ollama API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Create a provider. No request is made until the first embedding call.
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                AppError::Embedding(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts, _user), fields(batch_size = texts.len(), provider = "ollama", model = %self.model))]
    async fn embed_batch(
        &self,
        texts: &[String],
        _user: Option<&str>,
    ) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}{}", self.base_url, EMBED_ENDPOINT);
        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to send request to Ollama: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);
            return Err(AppError::Embedding(format!(
                "Ollama API error ({}): {}",
                status, message
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to parse Ollama response: {}", e)))?;

        if let Some(bad) = body.embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(AppError::Embedding(format!(
                "Unexpected embedding dimensions: got {}, expected {}",
                bad.len(),
                self.dimensions
            )));
        }

        debug!("Received {} embeddings", body.embeddings.len());
        Ok(body.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            engine: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            base_url: base_url.to_string(),
            timeout_secs: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = OllamaProvider::new(&config("http://localhost:11434/")).unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let provider = OllamaProvider::new(&config("http://127.0.0.1:9")).unwrap();
        assert!(provider.embed_batch(&[], None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_embedding_error() {
        let provider = OllamaProvider::new(&config("http://127.0.0.1:9")).unwrap();
        let result = provider.embed_batch(&["hello".to_string()], None).await;
        assert!(matches!(result, Err(AppError::Embedding(_))));
    }
}
