//! Dense and hybrid query execution.

use super::types::{QueryFailure, QueryReport, SearchHit};
use crate::embeddings::{EmbedPrefix, EmbeddingEngine};
use crate::rerank::Reranker;
use crate::store::{with_timeout, Filter, VectorStore, DEFAULT_STORE_TIMEOUT};
use crate::types::SearchResult;
use docindex_core::{AppError, AppResult};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Candidate multiplier when a filter has to be applied after ranking.
const POSTFILTER_OVERFETCH: usize = 4;

#[derive(Debug, Clone, Copy)]
enum Mode<'a> {
    Dense,
    Hybrid {
        reranker: &'a dyn Reranker,
        k_reranker: usize,
        relevance_threshold: f32,
    },
}

/// Executes queries against the vector store.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: Arc<dyn VectorStore>,
    embedder: EmbeddingEngine,
    reranker: Option<Arc<dyn Reranker>>,
    store_timeout: Duration,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: EmbeddingEngine,
        reranker: Option<Arc<dyn Reranker>>,
    ) -> Self {
        Self {
            store,
            embedder,
            reranker,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Deadline for each collection search.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    /// Top-`k` dense hits for one query in one collection.
    pub async fn query_doc(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        filter: Option<&Filter>,
        user: Option<&str>,
    ) -> AppResult<Vec<SearchHit>> {
        let vector = self.embed_query(query, user).await?;
        self.search_collection(collection, &vector, k, filter).await
    }

    /// Dense search of every query against every collection, merged.
    pub async fn query_collection(
        &self,
        collections: &[String],
        queries: &[String],
        k: usize,
        filter: Option<&Filter>,
        user: Option<&str>,
    ) -> AppResult<QueryReport> {
        self.run(collections, queries, k, filter, user, Mode::Dense)
            .await
    }

    /// Hybrid search: `max(k, k_reranker)` dense candidates per pair are
    /// reranked, candidates scoring below `relevance_threshold` are dropped,
    /// and the rest is merged and cut to `k`.
    #[allow(clippy::too_many_arguments)]
    pub async fn query_collection_with_hybrid_search(
        &self,
        collections: &[String],
        queries: &[String],
        k: usize,
        k_reranker: usize,
        relevance_threshold: f32,
        filter: Option<&Filter>,
        user: Option<&str>,
    ) -> AppResult<QueryReport> {
        let reranker = self.reranker.as_deref().ok_or_else(|| {
            AppError::Config("Hybrid search requires a reranking engine".to_string())
        })?;

        let mode = Mode::Hybrid {
            reranker,
            k_reranker,
            relevance_threshold,
        };
        self.run(collections, queries, k, filter, user, mode).await
    }

    async fn run(
        &self,
        collections: &[String],
        queries: &[String],
        k: usize,
        filter: Option<&Filter>,
        user: Option<&str>,
        mode: Mode<'_>,
    ) -> AppResult<QueryReport> {
        tracing::info!(
            "Querying {} collection(s) with {} query(ies), k={}, mode={}",
            collections.len(),
            queries.len(),
            k,
            match mode {
                Mode::Dense => "dense",
                Mode::Hybrid { .. } => "hybrid",
            }
        );

        let embedded = join_all(queries.iter().map(|q| self.embed_query(q, user))).await;

        let mut failures = Vec::new();
        let mut pairs = Vec::new();
        for (query, vector) in queries.iter().zip(embedded) {
            match vector {
                Ok(vector) => {
                    for collection in collections {
                        pairs.push((query, collection, vector.clone()));
                    }
                }
                Err(error) => {
                    tracing::warn!("Embedding query '{}' failed: {}", query, error);
                    failures.push(QueryFailure {
                        collection: None,
                        query: query.clone(),
                        error,
                    });
                }
            }
        }

        let outcomes = join_all(
            pairs
                .iter()
                .map(|(query, collection, vector)| {
                    self.query_pair(collection, query, vector, k, filter, mode)
                }),
        )
        .await;

        let mut pooled = Vec::new();
        let mut succeeded = 0;
        for ((query, collection, _), outcome) in pairs.iter().zip(outcomes) {
            match outcome {
                Ok(hits) => {
                    succeeded += 1;
                    pooled.extend(hits);
                }
                Err(error) => {
                    tracing::warn!(
                        "Query '{}' against '{}' failed: {}",
                        query,
                        collection,
                        error
                    );
                    failures.push(QueryFailure {
                        collection: Some((*collection).clone()),
                        query: (*query).clone(),
                        error,
                    });
                }
            }
        }

        if succeeded == 0 && !failures.is_empty() {
            return Err(failures.swap_remove(0).error);
        }

        let hits = merge_hits(pooled, k);
        tracing::debug!("Merged {} hits ({} failures)", hits.len(), failures.len());
        Ok(QueryReport { hits, failures })
    }

    async fn query_pair(
        &self,
        collection: &str,
        query: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&Filter>,
        mode: Mode<'_>,
    ) -> AppResult<Vec<SearchHit>> {
        match mode {
            Mode::Dense => self.search_collection(collection, vector, k, filter).await,
            Mode::Hybrid {
                reranker,
                k_reranker,
                relevance_threshold,
            } => {
                let mut candidates = self
                    .search_collection(collection, vector, k.max(k_reranker), filter)
                    .await?;
                if candidates.is_empty() {
                    return Ok(candidates);
                }

                let texts: Vec<String> = candidates.iter().map(|h| h.text.clone()).collect();
                let scores = reranker.rerank(query, &texts).await?;
                if scores.len() != candidates.len() {
                    return Err(AppError::Reranking(format!(
                        "Reranker '{}' returned {} scores for {} candidates",
                        reranker.name(),
                        scores.len(),
                        candidates.len()
                    )));
                }

                for (hit, score) in candidates.iter_mut().zip(scores) {
                    hit.score = score;
                }
                candidates.retain(|hit| hit.score >= relevance_threshold);
                sort_by_score(&mut candidates);
                candidates.truncate(k);
                Ok(candidates)
            }
        }
    }

    async fn embed_query(&self, query: &str, user: Option<&str>) -> AppResult<Vec<f32>> {
        let mut vectors = self
            .embedder
            .embed(&[query.to_string()], EmbedPrefix::Query, user)
            .await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned for query".to_string()))
    }

    /// Nearest neighbours in one collection. Filters are pushed down to the
    /// store when it supports it, otherwise applied to an over-fetched result.
    async fn search_collection(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&Filter>,
    ) -> AppResult<Vec<SearchHit>> {
        let postfilter = filter.filter(|_| !self.store.supports_prefilter());
        let (fetch, prefilter) = match postfilter {
            Some(_) => (limit.saturating_mul(POSTFILTER_OVERFETCH), None),
            None => (limit, filter),
        };

        let vectors = [vector.to_vec()];
        let result = with_timeout(
            &format!("search in '{}'", collection),
            self.store_timeout,
            self.store.search(collection, &vectors, fetch, prefilter),
        )
        .await?;

        let mut hits = first_group(collection, result);
        if let Some(filter) = postfilter {
            hits.retain(|hit| filter.matches(&hit.metadata));
        }
        hits.truncate(limit);
        Ok(hits)
    }
}

fn first_group(collection: &str, result: SearchResult) -> Vec<SearchHit> {
    let SearchResult {
        ids,
        documents,
        metadatas,
        scores,
    } = result;

    match (
        ids.into_iter().next(),
        documents.into_iter().next(),
        metadatas.into_iter().next(),
        scores.into_iter().next(),
    ) {
        (Some(ids), Some(documents), Some(metadatas), Some(scores)) => ids
            .into_iter()
            .zip(documents)
            .zip(metadatas)
            .zip(scores)
            .map(|(((id, text), metadata), score)| SearchHit {
                id,
                collection: collection.to_string(),
                text,
                metadata,
                score,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Stable, descending. Equal scores keep retrieval order.
fn sort_by_score(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Deduplicate by id (first occurrence wins), sort, keep `k`.
pub(crate) fn merge_hits(pooled: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    let mut hits: Vec<SearchHit> = pooled
        .into_iter()
        .filter(|hit| seen.insert(hit.id.clone()))
        .collect();
    sort_by_score(&mut hits);
    hits.truncate(k);
    hits
}
