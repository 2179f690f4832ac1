//! Test doubles shared by the scenario tests.

use crate::chunk::{ApproxTokenCounter, Splitter, SplitterKind};
use crate::config::KnowledgeConfig;
use crate::dedup::{BatchDuplicatePolicy, Deduplicator};
use crate::embeddings::providers::mock::MockProvider;
use crate::embeddings::{EmbeddingConfig, EmbeddingEngine, EmbeddingProvider};
use crate::ingest::Ingestor;
use crate::insert::InsertionPipeline;
use crate::load::{BatchSizer, FixedLoadProbe, LoadProbe, LoadSample};
use crate::rerank::Reranker;
use crate::service::RetrievalService;
use crate::store::{Filter, InMemoryStore, VectorStore};
use crate::types::{QueryResult, SearchResult, VectorItem};
use async_trait::async_trait;
use docindex_core::{AppError, AppResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory store that counts calls and injects failures.
#[derive(Debug)]
pub struct RecordingStore {
    inner: InMemoryStore,
    queries: AtomicUsize,
    inserts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    insert_delay: Option<Duration>,
    fail_insert_call: Option<usize>,
    fail_all_inserts: bool,
    fail_queries: bool,
    fail_search_in: Option<String>,
    hang_queries: bool,
    hang_search_in: Option<String>,
    prefilter: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            queries: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            insert_delay: None,
            fail_insert_call: None,
            fail_all_inserts: false,
            fail_queries: false,
            fail_search_in: None,
            hang_queries: false,
            hang_search_in: None,
            prefilter: true,
        }
    }

    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = Some(delay);
        self
    }

    /// Fail only the `n`th insert call (1-based).
    pub fn failing_insert_call(mut self, n: usize) -> Self {
        self.fail_insert_call = Some(n);
        self
    }

    pub fn failing_inserts(mut self) -> Self {
        self.fail_all_inserts = true;
        self
    }

    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    pub fn failing_search_in(mut self, collection: &str) -> Self {
        self.fail_search_in = Some(collection.to_string());
        self
    }

    /// `query` and `has_collection` never complete.
    pub fn hanging_queries(mut self) -> Self {
        self.hang_queries = true;
        self
    }

    /// `search` never completes for `collection`.
    pub fn hanging_search_in(mut self, collection: &str) -> Self {
        self.hang_search_in = Some(collection.to_string());
        self
    }

    /// Ignore filters passed to `search`, like a backend without pre-filtering.
    pub fn without_prefilter(mut self) -> Self {
        self.prefilter = false;
        self
    }

    pub fn query_calls(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.inner.count(collection).await
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    fn backend_name(&self) -> &str {
        "recording"
    }

    async fn has_collection(&self, collection: &str) -> AppResult<bool> {
        if self.hang_queries {
            std::future::pending::<()>().await;
        }
        self.inner.has_collection(collection).await
    }

    async fn insert(&self, collection: &str, items: &[VectorItem]) -> AppResult<()> {
        let call = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_all_inserts || self.fail_insert_call == Some(call) {
            return Err(AppError::VectorStore(format!(
                "injected failure on insert call {}",
                call
            )));
        }
        self.inner.insert(collection, items).await
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> AppResult<QueryResult> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.hang_queries {
            std::future::pending::<()>().await;
        }
        if self.fail_queries {
            return Err(AppError::VectorStore("injected query failure".to_string()));
        }
        self.inner.query(collection, filter, limit).await
    }

    async fn search(
        &self,
        collection: &str,
        vectors: &[Vec<f32>],
        limit: usize,
        filter: Option<&Filter>,
    ) -> AppResult<SearchResult> {
        if self.hang_search_in.as_deref() == Some(collection) {
            std::future::pending::<()>().await;
        }
        if self.fail_search_in.as_deref() == Some(collection) {
            return Err(AppError::VectorStore(format!(
                "injected search failure in {}",
                collection
            )));
        }
        let filter = if self.prefilter { filter } else { None };
        self.inner.search(collection, vectors, limit, filter).await
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> AppResult<usize> {
        self.inner.delete(collection, filter).await
    }

    async fn delete_collection(&self, collection: &str) -> AppResult<()> {
        self.inner.delete_collection(collection).await
    }

    async fn reset(&self) -> AppResult<()> {
        self.inner.reset().await
    }

    fn supports_prefilter(&self) -> bool {
        self.prefilter
    }
}

/// Embeds known texts to fixed vectors; unknown texts map to the zero vector.
#[derive(Debug)]
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimensions: usize,
    failing: HashSet<String>,
}

impl FixedEmbedder {
    pub fn new(dimensions: usize, pairs: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: pairs
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.clone()))
                .collect(),
            dimensions,
            failing: HashSet::new(),
        }
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    fn provider_name(&self) -> &str {
        "fixed"
    }

    fn model_name(&self) -> &str {
        "fixed-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        _user: Option<&str>,
    ) -> AppResult<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| {
                if self.failing.contains(text) {
                    return Err(AppError::Embedding(format!("cannot embed '{}'", text)));
                }
                Ok(self
                    .vectors
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| vec![0.0; self.dimensions]))
            })
            .collect()
    }
}

/// Scores candidates from a fixed table and remembers what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedReranker {
    scores: HashMap<String, f32>,
    pub seen: Mutex<Vec<(String, usize)>>,
}

impl ScriptedReranker {
    pub fn new(pairs: &[(&str, f32)]) -> Self {
        Self {
            scores: pairs.iter().map(|(t, s)| (t.to_string(), *s)).collect(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Reranker for ScriptedReranker {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn rerank(&self, query: &str, candidates: &[String]) -> AppResult<Vec<f32>> {
        self.seen
            .lock()
            .unwrap()
            .push((query.to_string(), candidates.len()));
        Ok(candidates
            .iter()
            .map(|c| self.scores.get(c).copied().unwrap_or(0.0))
            .collect())
    }
}

pub fn idle_probe() -> Arc<dyn LoadProbe> {
    Arc::new(FixedLoadProbe(LoadSample {
        cpu_percent: 5.0,
        available_memory_mb: 8192,
    }))
}

pub fn mock_engine() -> EmbeddingEngine {
    EmbeddingEngine::new(
        Arc::new(MockProvider::new("hashing-v1", 64)),
        EmbeddingConfig::default(),
    )
}

pub fn fixed_engine(embedder: FixedEmbedder) -> EmbeddingEngine {
    EmbeddingEngine::new(Arc::new(embedder), EmbeddingConfig::default())
}

pub fn test_ingestor(store: Arc<RecordingStore>, chunk_size: usize, chunk_overlap: usize) -> Ingestor {
    let store: Arc<dyn VectorStore> = store;
    let splitter = Splitter::new(
        SplitterKind::Character,
        chunk_size,
        chunk_overlap,
        Arc::new(ApproxTokenCounter),
    )
    .unwrap();
    let config = KnowledgeConfig::default();
    let pipeline = InsertionPipeline::new(
        Arc::clone(&store),
        BatchSizer::new(idle_probe()),
        &config.retrieval,
    );
    let dedup = Deduplicator::new(Arc::clone(&store), BatchDuplicatePolicy::AnyMatch);
    Ingestor::new(store, Arc::new(splitter), mock_engine(), pipeline, dedup)
}

pub fn test_service(
    store: Arc<RecordingStore>,
    config: KnowledgeConfig,
    embedder: EmbeddingEngine,
    reranker: Option<Arc<dyn Reranker>>,
) -> RetrievalService {
    RetrievalService::with_components(config, store, embedder, reranker, idle_probe()).unwrap()
}
