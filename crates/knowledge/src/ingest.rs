//! Shared write path: split, attach metadata, embed, insert.

use crate::chunk::{whole_documents, Splitter};
use crate::dedup::Deduplicator;
use crate::embeddings::{EmbedPrefix, EmbeddingEngine};
use crate::insert::InsertionPipeline;
use crate::metadata::{self, embedding_config_value, EMBEDDING_CONFIG_KEY, FILE_ID_KEY, HASH_KEY};
use crate::store::{with_timeout, Filter, VectorStore, DEFAULT_STORE_TIMEOUT};
use crate::types::{Chunk, Document, VectorItem};
use docindex_core::{AppError, AppResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Caller metadata layered over each chunk's own metadata.
#[derive(Debug, Clone, Default)]
pub enum MetadataSpec {
    #[default]
    None,
    /// Applied to every chunk. A `hash` entry triggers a duplicate check.
    Shared(Map<String, Value>),
    /// One entry per input document; chunks of document `i` get entry `i`.
    PerDocument(Vec<Map<String, Value>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Drop the collection first if it exists
    pub overwrite: bool,
    /// Split documents; otherwise each document is one chunk
    pub split: bool,
    /// Append to an existing collection; otherwise leave it untouched
    pub add: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            split: true,
            add: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted { chunks: usize, batches: usize },
    /// The collection already existed and neither `overwrite` nor `add` was set
    CollectionExists,
}

#[derive(Debug, Clone)]
pub struct Ingestor {
    store: Arc<dyn VectorStore>,
    splitter: Arc<Splitter>,
    embedder: EmbeddingEngine,
    pipeline: InsertionPipeline,
    dedup: Deduplicator,
    store_timeout: Duration,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn VectorStore>,
        splitter: Arc<Splitter>,
        embedder: EmbeddingEngine,
        pipeline: InsertionPipeline,
        dedup: Deduplicator,
    ) -> Self {
        Self {
            store,
            splitter,
            embedder,
            pipeline,
            dedup,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Deadline for collection checks and deletes.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Persist `documents` into `collection`.
    ///
    /// Fails with `DuplicateContent` when shared metadata carries a hash that
    /// is already stored, `EmptyContent` when nothing indexable remains, and
    /// `MetadataMismatch` when a per-document list does not line up with
    /// `documents`.
    pub async fn save_documents(
        &self,
        documents: &[Document],
        collection: &str,
        metadata: &MetadataSpec,
        options: SaveOptions,
        user: Option<&str>,
    ) -> AppResult<SaveOutcome> {
        tracing::info!(
            "Saving {} document(s) to collection '{}'",
            documents.len(),
            collection
        );

        if let MetadataSpec::Shared(shared) = metadata {
            if let Some(hash) = shared.get(HASH_KEY).and_then(Value::as_str) {
                if self.dedup.check_duplicate(collection, hash).await? {
                    tracing::info!("Document with hash {} already exists in '{}'", hash, collection);
                    return Err(AppError::DuplicateContent(hash.to_string()));
                }
            }
        }

        let chunks = if options.split {
            self.splitter.split_documents(documents)?
        } else {
            whole_documents(documents)
        };
        if chunks.is_empty() {
            return Err(AppError::EmptyContent(format!(
                "No content to index for collection '{}'",
                collection
            )));
        }

        if let MetadataSpec::PerDocument(list) = metadata {
            if list.len() != documents.len() {
                return Err(AppError::MetadataMismatch {
                    expected: documents.len(),
                    actual: list.len(),
                });
            }
        }

        let prepared = self.attach_metadata(chunks, metadata);

        let exists = with_timeout(
            &format!("collection check for '{}'", collection),
            self.store_timeout,
            self.store.has_collection(collection),
        )
        .await?;
        if exists {
            if options.overwrite {
                tracing::info!("Collection '{}' exists, overwriting", collection);
                with_timeout(
                    &format!("drop collection '{}'", collection),
                    self.store_timeout,
                    self.store.delete_collection(collection),
                )
                .await?;
            } else if !options.add {
                tracing::info!("Collection '{}' exists, leaving it untouched", collection);
                return Ok(SaveOutcome::CollectionExists);
            }
        }

        let texts: Vec<String> = prepared.iter().map(|(text, _)| text.clone()).collect();
        let vectors = self.embedder.embed(&texts, EmbedPrefix::Content, user).await?;

        let items: Vec<VectorItem> = prepared
            .into_iter()
            .zip(vectors)
            .map(|((text, metadata), vector)| VectorItem {
                id: Uuid::new_v4().to_string(),
                text,
                vector,
                metadata,
            })
            .collect();
        let chunk_count = items.len();

        let summary = self.pipeline.insert_all(collection, items).await?;
        tracing::info!(
            "Saved {} chunks to '{}' in {} batch(es)",
            chunk_count,
            collection,
            summary.batches
        );

        Ok(SaveOutcome::Inserted {
            chunks: chunk_count,
            batches: summary.batches,
        })
    }

    /// Remove a file's previous vectors, then save its new content.
    pub async fn replace_file(
        &self,
        documents: &[Document],
        collection: &str,
        file_id: &str,
        metadata: &MetadataSpec,
        user: Option<&str>,
    ) -> AppResult<SaveOutcome> {
        let filter = Filter::eq(FILE_ID_KEY, file_id);
        let removed = with_timeout(
            &format!("delete file {} from '{}'", file_id, collection),
            self.store_timeout,
            self.store.delete(collection, &filter),
        )
        .await?;
        tracing::info!(
            "Removed {} stale chunks of file {} from '{}'",
            removed,
            file_id,
            collection
        );

        let options = SaveOptions {
            add: true,
            ..Default::default()
        };
        self.save_documents(documents, collection, metadata, options, user)
            .await
    }

    fn attach_metadata(
        &self,
        chunks: Vec<Chunk>,
        metadata: &MetadataSpec,
    ) -> Vec<(String, metadata::Metadata)> {
        let shared = match metadata {
            MetadataSpec::Shared(map) => Some(metadata::normalize(map)),
            _ => None,
        };
        let per_document: Vec<metadata::Metadata> = match metadata {
            MetadataSpec::PerDocument(list) => list.iter().map(metadata::normalize).collect(),
            _ => Vec::new(),
        };
        let embedding_config =
            embedding_config_value(self.embedder.engine_name(), self.embedder.model_name());

        chunks
            .into_iter()
            .map(|chunk| {
                let extra = shared
                    .as_ref()
                    .or_else(|| per_document.get(chunk.document_index));
                let mut merged = match extra {
                    Some(extra) => metadata::merge(&chunk.metadata, extra),
                    None => chunk.metadata,
                };
                merged.insert(EMBEDDING_CONFIG_KEY.to_string(), embedding_config.clone());
                (chunk.content, merged)
            })
            .collect()
    }
}
