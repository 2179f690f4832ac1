//! Reranker backed by a `/rerank` HTTP endpoint (Jina/Cohere request shape).

use super::{Reranker, RerankingConfig};
use async_trait::async_trait;
use docindex_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct HttpReranker {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankEntry>,
}

#[derive(Debug, Deserialize)]
struct RerankEntry {
    index: usize,
    relevance_score: f32,
}

impl HttpReranker {
    pub fn new(config: &RerankingConfig, api_key: Option<String>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Reranking(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

/// Map `results` back onto candidate positions.
fn align_scores(entries: Vec<RerankEntry>, candidates: usize) -> AppResult<Vec<f32>> {
    if entries.len() != candidates {
        return Err(AppError::Reranking(format!(
            "Reranker returned {} scores for {} candidates",
            entries.len(),
            candidates
        )));
    }

    let mut scores = vec![None; candidates];
    for entry in entries {
        match scores.get_mut(entry.index) {
            Some(slot) => *slot = Some(entry.relevance_score),
            None => {
                return Err(AppError::Reranking(format!(
                    "Reranker returned out-of-range index {}",
                    entry.index
                )))
            }
        }
    }

    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            s.ok_or_else(|| AppError::Reranking(format!("Reranker returned no score for candidate {}", i)))
        })
        .collect()
}

#[async_trait]
impl Reranker for HttpReranker {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, query, candidates), fields(candidates = candidates.len(), model = %self.model))]
    async fn rerank(&self, query: &str, candidates: &[String]) -> AppResult<Vec<f32>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(&self.url).json(&RerankRequest {
            model: &self.model,
            query,
            documents: candidates,
            top_n: candidates.len(),
        });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Reranking(format!("Failed to send rerank request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Reranking(format!(
                "Rerank API error ({}): {}",
                status, error_text
            )));
        }

        let body: RerankResponse = response
            .json()
            .await
            .map_err(|e| AppError::Reranking(format!("Failed to parse rerank response: {}", e)))?;

        debug!("Received {} rerank scores", body.results.len());
        align_scores(body.results, candidates.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: usize, relevance_score: f32) -> RerankEntry {
        RerankEntry {
            index,
            relevance_score,
        }
    }

    #[test]
    fn test_align_scores_reorders_by_index() {
        let scores = align_scores(vec![entry(1, 0.9), entry(0, 0.2)], 2).unwrap();
        assert_eq!(scores, vec![0.2, 0.9]);
    }

    #[test]
    fn test_align_scores_rejects_short_response() {
        assert!(matches!(
            align_scores(vec![entry(0, 0.5)], 2),
            Err(AppError::Reranking(_))
        ));
    }

    #[test]
    fn test_align_scores_rejects_bad_index() {
        assert!(align_scores(vec![entry(0, 0.5), entry(5, 0.1)], 2).is_err());
        assert!(align_scores(vec![entry(0, 0.5), entry(0, 0.1)], 2).is_err());
    }

    #[test]
    fn test_response_parsing() {
        let body: RerankResponse = serde_json::from_str(
            r#"{"model":"m","results":[{"index":0,"relevance_score":0.7,"document":{"text":"x"}}]}"#,
        )
        .unwrap();
        assert_eq!(body.results[0].index, 0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let config = RerankingConfig {
            engine: "http".to_string(),
            url: "http://127.0.0.1:9/rerank".to_string(),
            timeout_secs: 1,
            ..Default::default()
        };
        let reranker = HttpReranker::new(&config, None).unwrap();
        let result = reranker.rerank("q", &["a".to_string()]).await;
        assert!(matches!(result, Err(AppError::Reranking(_))));
    }
}
