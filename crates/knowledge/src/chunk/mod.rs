//! Document splitting.
//!
//! Turns loaded documents into content-bearing chunks:
//! - Character windows or token windows with overlap
//! - Page header context (`# [Page N]:`) carried into every chunk
//! - Parent metadata inherited, plus the chunk's byte offset

mod pipeline;
pub mod splitters;

pub use pipeline::{page_header, whole_documents, Splitter};
pub use splitters::{ApproxTokenCounter, TokenCounter};

use docindex_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Splitting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitterKind {
    /// Fixed-size character windows
    Character,
    /// Token-count windows measured by a [`TokenCounter`]
    Token,
}

impl SplitterKind {
    /// Parse a configured splitter name. The empty string means `character`.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim() {
            "" | "character" => Ok(Self::Character),
            "token" => Ok(Self::Token),
            other => Err(AppError::Config(format!(
                "Invalid text splitter: '{}'. Supported: character, token",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Token => "token",
        }
    }
}

/// Built-in token counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerKind {
    /// Roughly four characters per token
    Approx,
    /// One token per whitespace-separated word
    Whitespace,
}

impl TokenizerKind {
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim() {
            "" | "approx" => Ok(Self::Approx),
            "whitespace" => Ok(Self::Whitespace),
            other => Err(AppError::Config(format!(
                "Unknown tokenizer: '{}'. Supported: approx, whitespace",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splitter_kind_parse() {
        assert_eq!(SplitterKind::parse("").unwrap(), SplitterKind::Character);
        assert_eq!(SplitterKind::parse("character").unwrap(), SplitterKind::Character);
        assert_eq!(SplitterKind::parse("token").unwrap(), SplitterKind::Token);
    }

    #[test]
    fn test_unknown_splitter_is_config_error() {
        let err = SplitterKind::parse("markdown").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("Invalid text splitter"));
    }

    #[test]
    fn test_tokenizer_parse() {
        assert_eq!(TokenizerKind::parse("approx").unwrap(), TokenizerKind::Approx);
        assert_eq!(TokenizerKind::parse("whitespace").unwrap(), TokenizerKind::Whitespace);
        assert!(TokenizerKind::parse("tiktoken").is_err());
    }
}
