//! Batch orchestration over many files.
//!
//! Every file moves through `received -> {skipped_duplicate | skipped_empty |
//! prepared} -> {completed | failed}`. Cheap rejections happen before any
//! embedding work, and all prepared files share one insertion call.

use crate::dedup::Deduplicator;
use crate::ingest::{Ingestor, MetadataSpec, SaveOptions};
use crate::metadata::{content_hash, FILE_ID_KEY, HASH_KEY};
use crate::types::{BatchResponse, BatchResult, BatchStatus, Document};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

/// A file handed to [`BatchOrchestrator::process_batch`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchFile {
    pub file_id: String,
    pub filename: String,
    /// Extracted text
    pub content: String,
    #[serde(default)]
    pub created_by: Option<String>,
    /// Loader metadata, copied onto the document
    #[serde(default)]
    pub meta: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    ingestor: Ingestor,
    dedup: Deduplicator,
}

impl BatchOrchestrator {
    pub fn new(ingestor: Ingestor, dedup: Deduplicator) -> Self {
        Self { ingestor, dedup }
    }

    /// Process `files` into `collection`.
    ///
    /// `results` holds one entry per file in input order; `errors` repeats the
    /// failed ones.
    pub async fn process_batch(
        &self,
        files: &[BatchFile],
        collection: &str,
        session_id: Option<&str>,
        user: Option<&str>,
    ) -> BatchResponse {
        let mut results: Vec<BatchResult> = files
            .iter()
            .map(|file| BatchResult::new(file.file_id.clone(), BatchStatus::Prepared))
            .collect();

        let texts: Vec<String> = files
            .iter()
            .map(|file| file.content.replace("<br/>", "\n"))
            .collect();
        let hashes: Vec<String> = files.iter().map(|file| content_hash(&file.content)).collect();

        let candidates: Vec<usize> = (0..files.len())
            .filter(|&i| !texts[i].trim().is_empty())
            .collect();
        for (i, result) in results.iter_mut().enumerate() {
            if texts[i].trim().is_empty() {
                result.status = BatchStatus::SkippedEmpty;
            }
        }

        let candidate_hashes: Vec<String> = candidates.iter().map(|&i| hashes[i].clone()).collect();
        let stored = match self.dedup.find_duplicates(collection, &candidate_hashes).await {
            Ok(flags) => flags,
            Err(e) => {
                tracing::error!(
                    "Duplicate lookup for batch in '{}' failed, continuing without it: {}",
                    collection,
                    e
                );
                vec![false; candidate_hashes.len()]
            }
        };

        let mut seen = HashSet::new();
        let mut documents = Vec::new();
        let mut metadata = Vec::new();
        let mut prepared = Vec::new();

        for (&i, is_stored) in candidates.iter().zip(stored) {
            let file = &files[i];
            if is_stored || !seen.insert(hashes[i].as_str()) {
                tracing::info!("Skipping duplicate file {}", file.file_id);
                results[i].status = BatchStatus::SkippedDuplicate;
                continue;
            }

            documents.push(build_document(file, &texts[i], session_id, user));
            metadata.push(build_metadata(file, &hashes[i], session_id));
            prepared.push(i);
        }

        let mut errors = Vec::new();
        if !documents.is_empty() {
            let options = SaveOptions {
                add: true,
                ..Default::default()
            };
            let outcome = self
                .ingestor
                .save_documents(
                    &documents,
                    collection,
                    &MetadataSpec::PerDocument(metadata),
                    options,
                    user,
                )
                .await;

            match outcome {
                Ok(_) => {
                    for &i in &prepared {
                        results[i].status = BatchStatus::Completed;
                    }
                }
                Err(e) => {
                    tracing::error!("Saving batch to '{}' failed: {}", collection, e);
                    let message = e.user_message();
                    for &i in &prepared {
                        results[i] = BatchResult::failed(results[i].file_id.clone(), message.clone());
                        errors.push(results[i].clone());
                    }
                }
            }
        }

        tracing::info!(
            "Batch into '{}': {} prepared, {} skipped, {} failed",
            collection,
            prepared.len(),
            results
                .iter()
                .filter(|r| matches!(r.status, BatchStatus::SkippedDuplicate | BatchStatus::SkippedEmpty))
                .count(),
            errors.len()
        );

        BatchResponse { results, errors }
    }
}

fn build_document(
    file: &BatchFile,
    text: &str,
    session_id: Option<&str>,
    user: Option<&str>,
) -> Document {
    let mut document = Document {
        content: text.to_string(),
        metadata: file.meta.clone(),
    };
    document = document
        .with_metadata("name", file.filename.as_str())
        .with_metadata(FILE_ID_KEY, file.file_id.as_str())
        .with_metadata("source", file.filename.as_str());
    if let Some(created_by) = file.created_by.as_deref().or(user) {
        document = document.with_metadata("created_by", created_by);
    }
    if let Some(session_id) = session_id {
        document = document.with_metadata("session_id", session_id);
    }
    document
}

fn build_metadata(file: &BatchFile, hash: &str, session_id: Option<&str>) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(FILE_ID_KEY.to_string(), Value::from(file.file_id.as_str()));
    metadata.insert("name".to_string(), Value::from(file.filename.as_str()));
    metadata.insert(HASH_KEY.to_string(), Value::from(hash));
    metadata.insert(
        "doc_type".to_string(),
        doc_type(file).map(Value::from).unwrap_or(Value::Null),
    );
    if let Some(session_id) = session_id {
        metadata.insert("session_id".to_string(), Value::from(session_id));
    }
    metadata
}

/// `doc_type` or `content_type` from the file's metadata, else a guess from
/// the extension.
fn doc_type(file: &BatchFile) -> Option<String> {
    ["doc_type", "content_type"]
        .iter()
        .filter_map(|key| file.meta.get(*key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| guess_content_type(&file.filename).map(str::to_string))
}

fn guess_content_type(filename: &str) -> Option<&'static str> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();
    match extension.as_str() {
        "txt" | "text" | "log" => Some("text/plain"),
        "md" | "markdown" => Some("text/markdown"),
        "csv" => Some("text/csv"),
        "html" | "htm" => Some("text/html"),
        "json" => Some("application/json"),
        "xml" => Some("application/xml"),
        "pdf" => Some("application/pdf"),
        "rs" => Some("text/x-rust"),
        "py" => Some("text/x-python"),
        _ => None,
    }
}
