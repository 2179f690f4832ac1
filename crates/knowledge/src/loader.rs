//! Plain-text file loading for the command-line boundary.

use crate::batch::BatchFile;
use crate::metadata::content_hash;
use docindex_core::{AppError, AppResult};
use serde_json::{Map, Value};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions read as text. Anything else is sniffed for binary content.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "text", "md", "markdown", "log", "csv", "json", "yaml", "yml", "toml", "html", "htm",
    "xml", "rs", "py", "js", "ts", "go", "c", "cpp", "java", "sh",
];

/// A file read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub name: String,
    pub content: String,
}

impl LoadedFile {
    /// Stable id for the file: the hash of its path.
    pub fn file_id(&self) -> String {
        content_hash(&self.path.to_string_lossy())
    }

    pub fn into_batch_file(self, created_by: Option<&str>) -> BatchFile {
        let mut meta = Map::new();
        meta.insert(
            "path".to_string(),
            Value::from(self.path.to_string_lossy().into_owned()),
        );
        BatchFile {
            file_id: self.file_id(),
            filename: self.name,
            content: self.content,
            created_by: created_by.map(str::to_string),
            meta,
        }
    }
}

/// Expand files and directories (recursively) into a sorted file list.
pub fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            tracing::warn!("Skipping missing path: {:?}", path);
        }
    }
    files
}

/// Read one file as text.
pub fn load_file(path: &Path) -> AppResult<LoadedFile> {
    let bytes = fs::read(path)?;

    let known_text = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if !known_text && !is_likely_text(&bytes) {
        return Err(AppError::EmptyContent(format!(
            "{:?} looks like a binary file",
            path
        )));
    }

    let content = String::from_utf8_lossy(&bytes).into_owned();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    Ok(LoadedFile {
        path: path.to_path_buf(),
        name,
        content,
    })
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Heuristic: no NUL bytes and mostly printable in the first 8 KiB.
fn is_likely_text(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(8192)];
    if sample.contains(&0) {
        return false;
    }
    let control = sample
        .iter()
        .filter(|b| b.is_ascii_control() && !matches!(b, b'\n' | b'\r' | b'\t'))
        .count();
    control * 10 <= sample.len()
}
