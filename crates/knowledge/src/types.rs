//! Ingestion and retrieval type definitions.

use crate::metadata::Metadata;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A loaded document, before splitting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Full text content
    pub content: String,

    /// Loader-supplied metadata (name, source, page, file_id, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A fragment of one document produced by the splitter.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Trimmed chunk text, prefixed with the page header when the parent had one
    pub content: String,

    /// Parent metadata plus chunk-specific fields
    pub metadata: Metadata,

    /// Byte offset of the chunk body inside the parent document
    pub start_index: usize,

    /// Index of the parent in the document slice that was split
    pub document_index: usize,
}

/// The unit persisted in a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorItem {
    /// Opaque unique id (UUID v4)
    pub id: String,

    /// Chunk text
    pub text: String,

    /// Embedding vector
    pub vector: Vec<f32>,

    /// Flattened metadata
    pub metadata: Metadata,
}

/// Items matched by a filter query, grouped per query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<Metadata>>,
}

impl QueryResult {
    /// A result with a single, empty group.
    pub fn empty() -> Self {
        Self {
            ids: vec![Vec::new()],
            documents: vec![Vec::new()],
            metadatas: vec![Vec::new()],
        }
    }

    /// Ids of the first group.
    pub fn first_ids(&self) -> &[String] {
        self.ids.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any group contains at least one item.
    pub fn has_matches(&self) -> bool {
        self.ids.iter().any(|group| !group.is_empty())
    }
}

/// Nearest-neighbour matches, grouped per query vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<Metadata>>,
    /// Cosine similarity, higher is closer
    pub scores: Vec<Vec<f32>>,
}

impl SearchResult {
    /// Append one group of matches.
    pub fn push_group(&mut self, hits: Vec<(VectorItem, f32)>) {
        let mut ids = Vec::with_capacity(hits.len());
        let mut documents = Vec::with_capacity(hits.len());
        let mut metadatas = Vec::with_capacity(hits.len());
        let mut scores = Vec::with_capacity(hits.len());
        for (item, score) in hits {
            ids.push(item.id);
            documents.push(item.text);
            metadatas.push(item.metadata);
            scores.push(score);
        }
        self.ids.push(ids);
        self.documents.push(documents);
        self.metadatas.push(metadatas);
        self.scores.push(scores);
    }
}

/// Final status of one document in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Prepared,
    Completed,
    SkippedDuplicate,
    SkippedEmpty,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Prepared => "prepared",
            BatchStatus::Completed => "completed",
            BatchStatus::SkippedDuplicate => "skipped_duplicate",
            BatchStatus::SkippedEmpty => "skipped_empty",
            BatchStatus::Failed => "failed",
        }
    }
}

/// Per-document outcome of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub file_id: String,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResult {
    pub fn new(file_id: impl Into<String>, status: BatchStatus) -> Self {
        Self {
            file_id: file_id.into(),
            status,
            error: None,
        }
    }

    pub fn failed(file_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            status: BatchStatus::Failed,
            error: Some(error.into()),
        }
    }
}

/// Response of a batch run. `results` has one entry per input document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<BatchResult>,
    pub errors: Vec<BatchResult>,
}

/// Response of a single-document ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub collection: String,
    pub success: bool,
    /// Chunks written by this call (0 when the collection was left untouched)
    pub chunks: usize,
}
