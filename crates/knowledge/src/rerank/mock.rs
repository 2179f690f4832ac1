use super::Reranker;
use async_trait::async_trait;
use docindex_core::AppResult;
use std::collections::HashSet;

/// Scores a candidate by the fraction of distinct query terms it contains.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermOverlapReranker;

fn terms(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Reranker for TermOverlapReranker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn rerank(&self, query: &str, candidates: &[String]) -> AppResult<Vec<f32>> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(vec![0.0; candidates.len()]);
        }

        Ok(candidates
            .iter()
            .map(|candidate| {
                let candidate_terms = terms(candidate);
                let shared = query_terms.intersection(&candidate_terms).count();
                shared as f32 / query_terms.len() as f32
            })
            .collect())
    }
}
