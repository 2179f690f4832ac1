//! Error types for docindex.
//!
//! This module defines a unified error enum covering configuration, content
//! rejection, upstream (embedding, reranking, vector store) and I/O failures.

use std::time::Duration;

use thiserror::Error;

/// Message used when an error carries no text of its own.
pub const GENERIC_ERROR_MESSAGE: &str = "Internal error occurred while processing request";

/// Unified error type for docindex.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The content hash is already present in the target collection
    #[error("Duplicate content detected (hash {0})")]
    DuplicateContent(String),

    /// Nothing indexable was left after splitting
    #[error("No content to index: {0}")]
    EmptyContent(String),

    /// An explicit per-document metadata list did not line up with the documents
    #[error("Metadata mismatch: expected {expected} entries, got {actual}")]
    MetadataMismatch { expected: usize, actual: usize },

    /// Embedding function failures
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Reranking function failures
    #[error("Reranking error: {0}")]
    Reranking(String),

    /// Vector store failures
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// An upstream call exceeded its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// True for failures of an external collaborator (embedding, reranking,
    /// vector store), including their timeouts.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::Embedding(_)
                | AppError::Reranking(_)
                | AppError::VectorStore(_)
                | AppError::Timeout { .. }
        )
    }

    /// True when the caller can resolve the error by skipping the input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::DuplicateContent(_) | AppError::EmptyContent(_))
    }

    /// Text suitable for a per-item failure report. Never empty.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_classification() {
        assert!(AppError::Embedding("down".into()).is_upstream());
        assert!(AppError::Timeout {
            operation: "insert".into(),
            after: Duration::from_secs(1)
        }
        .is_upstream());
        assert!(!AppError::Config("bad".into()).is_upstream());
        assert!(!AppError::DuplicateContent("abc".into()).is_upstream());
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(AppError::DuplicateContent("abc".into()).is_recoverable());
        assert!(AppError::EmptyContent("doc".into()).is_recoverable());
        assert!(!AppError::VectorStore("io".into()).is_recoverable());
    }

    #[test]
    fn test_user_message_never_empty() {
        assert_eq!(AppError::Other(String::new()).user_message(), GENERIC_ERROR_MESSAGE);
        assert_eq!(
            AppError::VectorStore("disk full".into()).user_message(),
            "Vector store error: disk full"
        );
    }
}
