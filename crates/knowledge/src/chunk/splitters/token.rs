//! Token window splitter with a pluggable token counter.

use super::ChunkSplitter;
use docindex_core::{AppError, AppResult};
use std::sync::Arc;
use text_splitter::{ChunkConfig, ChunkSizer, TextSplitter};

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync + std::fmt::Debug {
    fn count(&self, text: &str) -> usize;
}

/// Approximates a BPE tokenizer at four characters per token.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

/// One token per whitespace-separated word.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenCounter;

impl TokenCounter for WhitespaceTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Adapts a [`TokenCounter`] to the text-splitter sizing interface.
struct CounterSizer(Arc<dyn TokenCounter>);

impl ChunkSizer for CounterSizer {
    fn size(&self, chunk: &str) -> usize {
        self.0.count(chunk)
    }
}

/// Windows of at most `chunk_size` tokens, overlapping by `overlap` tokens.
#[derive(Debug, Clone)]
pub struct TokenSplitter {
    chunk_size: usize,
    overlap: usize,
    counter: Arc<dyn TokenCounter>,
}

impl TokenSplitter {
    pub fn new(chunk_size: usize, overlap: usize, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            chunk_size,
            overlap,
            counter,
        }
    }
}

impl ChunkSplitter for TokenSplitter {
    fn split_text<'a>(&self, text: &'a str) -> AppResult<Vec<(usize, &'a str)>> {
        let config = ChunkConfig::new(self.chunk_size)
            .with_sizer(CounterSizer(Arc::clone(&self.counter)))
            .with_overlap(self.overlap)
            .map_err(|e| AppError::Config(format!("Invalid chunk settings: {}", e)))?;
        let splitter = TextSplitter::new(config);

        let windows: Vec<(usize, &str)> = splitter
            .chunk_indices(text)
            .filter(|(_, chunk)| !chunk.trim().is_empty())
            .collect();

        tracing::debug!(
            "Token splitter created {} windows from {} bytes",
            windows.len(),
            text.len()
        );

        Ok(windows)
    }

    fn name(&self) -> &'static str {
        "token"
    }
}
