//! Splitting pipeline: window splitting, page headers and metadata inheritance.

use super::splitters::{
    ApproxTokenCounter, CharacterSplitter, ChunkSplitter, TokenCounter, TokenSplitter,
    WhitespaceTokenCounter,
};
use super::{SplitterKind, TokenizerKind};
use crate::config::RetrievalConfig;
use crate::metadata::{self, MetadataValue, START_INDEX_KEY};
use crate::types::{Chunk, Document};
use docindex_core::{AppError, AppResult};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Splits documents into chunks with a configured strategy.
pub struct Splitter {
    kind: SplitterKind,
    inner: Box<dyn ChunkSplitter>,
}

impl std::fmt::Debug for Splitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Splitter").field("kind", &self.kind).finish()
    }
}

impl Splitter {
    /// Create a splitter. The counter is only consulted by [`SplitterKind::Token`].
    pub fn new(
        kind: SplitterKind,
        chunk_size: usize,
        chunk_overlap: usize,
        counter: Arc<dyn TokenCounter>,
    ) -> AppResult<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(AppError::Config(format!(
                "Invalid chunk settings: size {} / overlap {}",
                chunk_size, chunk_overlap
            )));
        }

        let inner: Box<dyn ChunkSplitter> = match kind {
            SplitterKind::Character => Box::new(CharacterSplitter::new(chunk_size, chunk_overlap)),
            SplitterKind::Token => {
                Box::new(TokenSplitter::new(chunk_size, chunk_overlap, counter))
            }
        };

        Ok(Self { kind, inner })
    }

    /// Build from retrieval settings, using the configured built-in token counter.
    pub fn from_config(config: &RetrievalConfig) -> AppResult<Self> {
        let counter: Arc<dyn TokenCounter> = match config.tokenizer_kind()? {
            TokenizerKind::Approx => Arc::new(ApproxTokenCounter),
            TokenizerKind::Whitespace => Arc::new(WhitespaceTokenCounter),
        };
        Self::new(
            config.splitter_kind()?,
            config.chunk_size,
            config.chunk_overlap,
            counter,
        )
    }

    pub fn kind(&self) -> SplitterKind {
        self.kind
    }

    /// Split one document.
    ///
    /// Chunks are trimmed, never empty, and carry the parent's normalized
    /// metadata plus `start_index`. When the parent has page context every
    /// chunk is prefixed with the page header, stripping a copy the window
    /// may already start with.
    pub fn split(&self, document: &Document, document_index: usize) -> AppResult<Vec<Chunk>> {
        let header = page_header(&document.metadata);
        let base_metadata = metadata::normalize(&document.metadata);
        let text = document.content.as_str();

        let mut chunks = Vec::new();
        for (_, window) in self.inner.split_text(text)? {
            let mut body = window.trim();
            if let Some(ref header) = header {
                if let Some(rest) = body.strip_prefix(header.as_str()) {
                    body = rest.trim();
                }
            }
            if body.is_empty() {
                continue;
            }

            let start_index = byte_offset(text, body);
            let content = match header {
                Some(ref header) => format!("{}{}", header, body),
                None => body.to_string(),
            };

            let mut chunk_metadata = base_metadata.clone();
            chunk_metadata.insert(START_INDEX_KEY.to_string(), MetadataValue::from(start_index));

            chunks.push(Chunk {
                content,
                metadata: chunk_metadata,
                start_index,
                document_index,
            });
        }

        tracing::debug!(
            "{} splitter produced {} chunks for document {} ({} bytes)",
            self.inner.name(),
            chunks.len(),
            document_index,
            text.len()
        );

        Ok(chunks)
    }

    /// Split every document, preserving document order.
    pub fn split_documents(&self, documents: &[Document]) -> AppResult<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for (index, document) in documents.iter().enumerate() {
            chunks.extend(self.split(document, index)?);
        }
        Ok(chunks)
    }
}

/// Wrap documents as single chunks without splitting. Whitespace-only
/// documents are dropped.
pub fn whole_documents(documents: &[Document]) -> Vec<Chunk> {
    documents
        .iter()
        .enumerate()
        .filter(|(_, document)| !document.content.trim().is_empty())
        .map(|(index, document)| Chunk {
            content: document.content.clone(),
            metadata: metadata::normalize(&document.metadata),
            start_index: 0,
            document_index: index,
        })
        .collect()
}

/// Page header derived from loader metadata.
///
/// `page_label` is used verbatim; `page_number` and `page` are zero-based.
pub fn page_header(metadata: &Map<String, Value>) -> Option<String> {
    let label = match metadata.get("page_label") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    };

    let page = label.or_else(|| {
        ["page_number", "page"]
            .iter()
            .find_map(|key| metadata.get(*key).and_then(Value::as_i64))
            .map(|n| (n + 1).to_string())
    })?;

    Some(format!("# [Page {}]:\n\n", page))
}

/// Byte offset of `inner`, a subslice of `outer`.
fn byte_offset(outer: &str, inner: &str) -> usize {
    inner.as_ptr() as usize - outer.as_ptr() as usize
}
