//! Character window splitter using the text-splitter crate.

use super::ChunkSplitter;
use docindex_core::{AppError, AppResult};
use text_splitter::{ChunkConfig, TextSplitter};

/// Windows of at most `chunk_size` characters, overlapping by `overlap`.
#[derive(Debug, Clone)]
pub struct CharacterSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl CharacterSplitter {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }
}

impl ChunkSplitter for CharacterSplitter {
    fn split_text<'a>(&self, text: &'a str) -> AppResult<Vec<(usize, &'a str)>> {
        let config = ChunkConfig::new(self.chunk_size)
            .with_overlap(self.overlap)
            .map_err(|e| AppError::Config(format!("Invalid chunk settings: {}", e)))?;
        let splitter = TextSplitter::new(config);

        let windows: Vec<(usize, &str)> = splitter
            .chunk_indices(text)
            .filter(|(_, chunk)| !chunk.trim().is_empty())
            .collect();

        tracing::debug!(
            "Character splitter created {} windows from {} bytes",
            windows.len(),
            text.len()
        );

        Ok(windows)
    }

    fn name(&self) -> &'static str {
        "character"
    }
}
