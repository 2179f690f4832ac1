//! Retrieval service: the operations exposed to the boundary layer.
//!
//! Built once per process from a [`KnowledgeConfig`] and a store. Holds the
//! insertion limiter and the load probe; nothing else is shared state.

use crate::batch::{BatchFile, BatchOrchestrator};
use crate::chunk::Splitter;
use crate::collections::user_collection_name;
use crate::config::KnowledgeConfig;
use crate::dedup::Deduplicator;
use crate::embeddings::EmbeddingEngine;
use crate::ingest::{Ingestor, MetadataSpec, SaveOptions, SaveOutcome};
use crate::insert::InsertionPipeline;
use crate::load::{BatchSizer, LoadProbe, SystemLoadProbe};
use crate::metadata::{self, content_hash, FILE_ID_KEY, HASH_KEY};
use crate::rag::{QueryEngine, QueryReport};
use crate::rerank::{create_reranker, Reranker};
use crate::store::{with_timeout, Filter, VectorStore};
use crate::types::{BatchResponse, Document, ProcessResponse, QueryResult};
use docindex_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A single file to ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub file_id: String,
    pub name: String,
    pub content: String,
    /// Target collection; the user's collection when absent
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_true")]
    pub add: bool,
    #[serde(default = "default_true")]
    pub split: bool,
    /// Drop this file's previous chunks before saving
    #[serde(default)]
    pub replace: bool,
    /// Index the file's chunks already stored in the user's collection into
    /// `collection`, ignoring `content`
    #[serde(default)]
    pub reuse_indexed: bool,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl DocumentRequest {
    pub fn new(
        file_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            name: name.into(),
            content: content.into(),
            collection: None,
            user_id: None,
            session_id: None,
            overwrite: false,
            add: true,
            split: true,
            replace: false,
            reuse_indexed: false,
            meta: Map::new(),
        }
    }
}

/// Per-call query knobs. Unset values fall back to the retrieval config.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub k: Option<usize>,
    pub k_reranker: Option<usize>,
    pub relevance_threshold: Option<f32>,
    pub hybrid: Option<bool>,
    pub filter: Option<Filter>,
    pub user: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RetrievalService {
    config: KnowledgeConfig,
    store: Arc<dyn VectorStore>,
    ingestor: Ingestor,
    batches: BatchOrchestrator,
    queries: QueryEngine,
}

impl RetrievalService {
    /// Build every component from configuration, sampling the host for load.
    pub fn new(config: KnowledgeConfig, store: Arc<dyn VectorStore>) -> AppResult<Self> {
        let embedder = EmbeddingEngine::from_config(&config.embedding)?;
        let reranker = create_reranker(&config.reranking)?;
        Self::with_components(config, store, embedder, reranker, Arc::new(SystemLoadProbe::new()))
    }

    /// Build with explicit collaborators.
    pub fn with_components(
        config: KnowledgeConfig,
        store: Arc<dyn VectorStore>,
        embedder: EmbeddingEngine,
        reranker: Option<Arc<dyn Reranker>>,
        probe: Arc<dyn LoadProbe>,
    ) -> AppResult<Self> {
        config.validate()?;
        let store_timeout = config.retrieval.store_timeout();

        let splitter = Arc::new(Splitter::from_config(&config.retrieval)?);
        let dedup = Deduplicator::new(Arc::clone(&store), config.retrieval.batch_duplicate_policy)
            .with_timeout(store_timeout);
        let pipeline =
            InsertionPipeline::new(Arc::clone(&store), BatchSizer::new(probe), &config.retrieval);

        tracing::debug!(
            "Retrieval service ready: store={}, splitter={:?}, duplicates={:?}, hybrid={}",
            store.backend_name(),
            splitter.kind(),
            dedup.policy(),
            config.retrieval.enable_hybrid_search
        );

        let ingestor = Ingestor::new(
            Arc::clone(&store),
            splitter,
            embedder.clone(),
            pipeline,
            dedup.clone(),
        )
        .with_store_timeout(store_timeout);
        let batches = BatchOrchestrator::new(ingestor.clone(), dedup);
        let queries = QueryEngine::new(Arc::clone(&store), embedder, reranker)
            .with_store_timeout(store_timeout);
        if config.retrieval.enable_hybrid_search && !queries.has_reranker() {
            tracing::warn!("Hybrid search is enabled but no reranking engine is configured");
        }

        Ok(Self {
            config,
            store,
            ingestor,
            batches,
            queries,
        })
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Ingest one file.
    pub async fn process_document(&self, request: DocumentRequest) -> AppResult<ProcessResponse> {
        if request.reuse_indexed {
            return self.index_stored_file(&request).await;
        }

        let collection = resolve_collection(request.collection.as_deref(), request.user_id.as_deref())?;
        let hash = content_hash(&request.content);

        let mut document = Document {
            content: request.content.clone(),
            metadata: request.meta.clone(),
        }
        .with_metadata("name", request.name.as_str())
        .with_metadata(FILE_ID_KEY, request.file_id.as_str())
        .with_metadata("source", request.name.as_str());
        if let Some(ref user_id) = request.user_id {
            document = document.with_metadata("created_by", user_id.as_str());
        }
        if let Some(ref session_id) = request.session_id {
            document = document.with_metadata("session_id", session_id.as_str());
        }

        let metadata = file_metadata(&request, hash);

        let documents = [document];
        let user = request.user_id.as_deref();
        let outcome = if request.replace {
            self.ingestor
                .replace_file(&documents, &collection, &request.file_id, &metadata, user)
                .await?
        } else {
            let options = SaveOptions {
                overwrite: request.overwrite,
                split: request.split,
                add: request.add,
            };
            self.ingestor
                .save_documents(&documents, &collection, &metadata, options, user)
                .await?
        };

        Ok(response(collection, outcome))
    }

    /// Ingest free text into `collection`, or the user's collection.
    pub async fn process_text(
        &self,
        name: &str,
        content: &str,
        collection: Option<&str>,
        user_id: Option<&str>,
        session_id: Option<&str>,
    ) -> AppResult<ProcessResponse> {
        let collection = resolve_collection(collection, user_id)?;

        let mut document = Document::new(content).with_metadata("name", name);
        if let Some(user_id) = user_id {
            document = document.with_metadata("created_by", user_id);
        }
        if let Some(session_id) = session_id {
            document = document.with_metadata("session_id", session_id);
        }

        let outcome = self
            .ingestor
            .save_documents(
                &[document],
                &collection,
                &MetadataSpec::None,
                SaveOptions::default(),
                user_id,
            )
            .await?;

        Ok(response(collection, outcome))
    }

    /// Ingest many files with per-file outcomes.
    pub async fn process_batch(
        &self,
        files: &[BatchFile],
        collection: Option<&str>,
        session_id: Option<&str>,
        user_id: Option<&str>,
    ) -> AppResult<BatchResponse> {
        let collection = resolve_collection(collection, user_id)?;
        Ok(self
            .batches
            .process_batch(files, &collection, session_id, user_id)
            .await)
    }

    pub async fn query_single_collection(
        &self,
        collection: &str,
        query: &str,
        options: &QueryOptions,
    ) -> AppResult<QueryReport> {
        if self.use_hybrid(options) {
            return self
                .query_multi_collection(&[collection.to_string()], &[query.to_string()], options)
                .await;
        }

        let hits = self
            .queries
            .query_doc(
                collection,
                query,
                options.k.unwrap_or(self.config.retrieval.top_k),
                options.filter.as_ref(),
                options.user.as_deref(),
            )
            .await?;
        Ok(QueryReport {
            hits,
            failures: Vec::new(),
        })
    }

    pub async fn query_multi_collection(
        &self,
        collections: &[String],
        queries: &[String],
        options: &QueryOptions,
    ) -> AppResult<QueryReport> {
        let retrieval = &self.config.retrieval;
        let k = options.k.unwrap_or(retrieval.top_k);

        if self.use_hybrid(options) {
            self.queries
                .query_collection_with_hybrid_search(
                    collections,
                    queries,
                    k,
                    options.k_reranker.unwrap_or(retrieval.top_k_reranker),
                    options
                        .relevance_threshold
                        .unwrap_or(retrieval.relevance_threshold),
                    options.filter.as_ref(),
                    options.user.as_deref(),
                )
                .await
        } else {
            self.queries
                .query_collection(
                    collections,
                    queries,
                    k,
                    options.filter.as_ref(),
                    options.user.as_deref(),
                )
                .await
        }
    }

    /// Delete matching items. Returns whether the collection existed.
    pub async fn delete(&self, collection: &str, filter: &Filter) -> AppResult<bool> {
        let timeout = self.config.retrieval.store_timeout();
        let exists = with_timeout(
            &format!("collection check for '{}'", collection),
            timeout,
            self.store.has_collection(collection),
        )
        .await?;
        if !exists {
            return Ok(false);
        }

        let removed = with_timeout(
            &format!("delete from '{}'", collection),
            timeout,
            self.store.delete(collection, filter),
        )
        .await?;
        tracing::info!("Deleted {} items from '{}'", removed, collection);
        Ok(true)
    }

    pub async fn reset_all(&self) -> AppResult<()> {
        tracing::warn!("Resetting vector store ({})", self.store.backend_name());
        with_timeout(
            "reset vector store",
            self.config.retrieval.store_timeout(),
            self.store.reset(),
        )
        .await
    }

    /// Copy a file's chunks from the user's collection into the requested one.
    ///
    /// The stored chunk texts become the documents, so nothing is re-extracted.
    /// Fails with `EmptyContent` when the user's collection holds no chunks
    /// for the file.
    async fn index_stored_file(&self, request: &DocumentRequest) -> AppResult<ProcessResponse> {
        let user_id = request.user_id.as_deref().ok_or_else(|| {
            AppError::Config("Reusing indexed chunks requires a user id".to_string())
        })?;
        let collection = match request.collection.as_deref() {
            Some(collection) if !collection.is_empty() => collection.to_string(),
            _ => {
                return Err(AppError::Config(
                    "Reusing indexed chunks requires a target collection".to_string(),
                ))
            }
        };

        let source = user_collection_name(user_id);
        let filter = Filter::eq(FILE_ID_KEY, request.file_id.as_str());
        let stored = with_timeout(
            &format!("read file {} from '{}'", request.file_id, source),
            self.config.retrieval.store_timeout(),
            self.store.query(&source, &filter, None),
        )
        .await?;

        let documents = stored_documents(stored, request.session_id.as_deref());
        if documents.is_empty() {
            return Err(AppError::EmptyContent(format!(
                "No indexed chunks for file {} in '{}'",
                request.file_id, source
            )));
        }
        tracing::info!(
            "Indexing {} stored chunks of file {} from '{}' into '{}'",
            documents.len(),
            request.file_id,
            source,
            collection
        );

        let text: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let metadata = file_metadata(request, content_hash(&text.join(" ")));
        let options = SaveOptions {
            overwrite: false,
            split: request.split,
            add: true,
        };
        let outcome = self
            .ingestor
            .save_documents(&documents, &collection, &metadata, options, Some(user_id))
            .await?;

        Ok(response(collection, outcome))
    }

    fn use_hybrid(&self, options: &QueryOptions) -> bool {
        options
            .hybrid
            .unwrap_or(self.config.retrieval.enable_hybrid_search)
    }
}

fn resolve_collection(collection: Option<&str>, user_id: Option<&str>) -> AppResult<String> {
    match (collection, user_id) {
        (Some(collection), _) if !collection.is_empty() => Ok(collection.to_string()),
        (_, Some(user_id)) => Ok(user_collection_name(user_id)),
        _ => Err(AppError::Config(
            "A collection name or user id is required".to_string(),
        )),
    }
}

/// Shared metadata stamped on every chunk of a file.
fn file_metadata(request: &DocumentRequest, hash: String) -> MetadataSpec {
    let mut shared = Map::new();
    shared.insert(FILE_ID_KEY.to_string(), Value::from(request.file_id.as_str()));
    shared.insert("name".to_string(), Value::from(request.name.as_str()));
    shared.insert(HASH_KEY.to_string(), Value::from(hash));
    if let Some(ref session_id) = request.session_id {
        shared.insert("session_id".to_string(), Value::from(session_id.as_str()));
    }
    MetadataSpec::Shared(shared)
}

fn stored_documents(result: QueryResult, session_id: Option<&str>) -> Vec<Document> {
    let QueryResult {
        documents,
        metadatas,
        ..
    } = result;
    let texts = documents.into_iter().next().unwrap_or_default();
    let metadatas = metadatas.into_iter().next().unwrap_or_default();

    texts
        .into_iter()
        .zip(metadatas)
        .map(|(content, stored)| {
            let mut document = Document {
                content,
                metadata: metadata::to_json_map(&stored),
            };
            if let Some(session_id) = session_id {
                document = document.with_metadata("session_id", session_id);
            }
            document
        })
        .collect()
}

fn response(collection: String, outcome: SaveOutcome) -> ProcessResponse {
    let chunks = match outcome {
        SaveOutcome::Inserted { chunks, .. } => chunks,
        SaveOutcome::CollectionExists => 0,
    };
    ProcessResponse {
        collection,
        success: true,
        chunks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_collection() {
        assert_eq!(resolve_collection(Some("kb-x-1"), Some("7")).unwrap(), "kb-x-1");
        assert_eq!(resolve_collection(None, Some("7")).unwrap(), "user-7");
        assert_eq!(resolve_collection(Some(""), Some("7")).unwrap(), "user-7");
        assert!(matches!(resolve_collection(None, None), Err(AppError::Config(_))));
    }

    #[test]
    fn test_document_request_defaults() {
        let request: DocumentRequest =
            serde_json::from_str(r#"{"file_id":"f","name":"n","content":"c"}"#).unwrap();
        assert!(request.add);
        assert!(request.split);
        assert!(!request.overwrite);
        assert!(!request.replace);
    }
}
