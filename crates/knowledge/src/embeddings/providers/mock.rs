//! Deterministic hashing embeddings for tests and offline use.

use crate::embeddings::provider::EmbeddingProvider;
use async_trait::async_trait;
use docindex_core::AppResult;

/// Mock provider for testing and development.
///
/// Hashes lowercase words and their character trigrams into a fixed number of
/// buckets and L2-normalizes the result. Texts sharing vocabulary end up close
/// under cosine similarity; identical texts get identical vectors.
#[derive(Debug)]
pub struct MockProvider {
    model: String,
    dimensions: usize,
}

impl MockProvider {
    pub fn new(model: &str, dimensions: usize) -> Self {
        Self {
            model: model.to_string(),
            dimensions,
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return embedding;
        }

        let lower = text.to_lowercase();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            embedding[bucket(word.as_bytes(), self.dimensions)] += 1.0;

            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                embedding[bucket(trigram.as_bytes(), self.dimensions)] += 0.5;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }
        embedding
    }
}

/// FNV-1a bucket index.
fn bucket(bytes: &[u8], dimensions: usize) -> usize {
    let hash = bytes.iter().fold(0xcbf29ce484222325u64, |acc, b| {
        (acc ^ *b as u64).wrapping_mul(0x100000001b3)
    });
    (hash % dimensions as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        _user: Option<&str>,
    ) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::cosine_similarity;

    #[tokio::test]
    async fn test_mock_provider_normalized() {
        let provider = MockProvider::new("hashing-v1", 64);
        let embeddings = provider
            .embed_batch(&["hello world".to_string()], None)
            .await
            .unwrap();

        assert_eq!(embeddings[0].len(), 64);
        let norm: f32 = embeddings[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_mock_provider_deterministic_and_ordered() {
        let provider = MockProvider::new("hashing-v1", 128);
        let texts = vec![
            "rust programming".to_string(),
            "pasta recipes".to_string(),
            "rust programming".to_string(),
        ];

        let embeddings = provider.embed_batch(&texts, None).await.unwrap();
        assert_eq!(embeddings.len(), 3);
        assert_eq!(embeddings[0], embeddings[2]);
        assert_ne!(embeddings[0], embeddings[1]);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let provider = MockProvider::new("hashing-v1", 256);
        let texts = vec![
            "alpha chunk one".to_string(),
            "beta chunk".to_string(),
            "alpha".to_string(),
        ];
        let e = provider.embed_batch(&texts, None).await.unwrap();

        assert!(cosine_similarity(&e[2], &e[0]) > cosine_similarity(&e[2], &e[1]));
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let provider = MockProvider::new("hashing-v1", 8);
        let e = provider.embed_batch(&[String::new()], None).await.unwrap();
        assert!(e[0].iter().all(|v| *v == 0.0));
    }
}
