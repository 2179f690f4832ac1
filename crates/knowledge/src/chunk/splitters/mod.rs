//! Splitter implementations wrapper module.

mod text;
mod token;

pub use text::CharacterSplitter;
pub use token::{ApproxTokenCounter, TokenCounter, TokenSplitter, WhitespaceTokenCounter};

use docindex_core::AppResult;

/// Trait for window splitters.
pub trait ChunkSplitter: Send + Sync {
    /// Split text into trimmed windows, each paired with its byte offset in `text`.
    fn split_text<'a>(&self, text: &'a str) -> AppResult<Vec<(usize, &'a str)>>;

    /// Name recorded in logs.
    fn name(&self) -> &'static str;
}
