//! Ingestion commands: single files, free text and batches.

use super::{open_service, print_json};
use clap::Args;
use docindex_core::{config::AppConfig, AppError, AppResult};
use docindex_knowledge::loader::{collect_files, load_file, LoadedFile};
use docindex_knowledge::{BatchStatus, DocumentRequest};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Target collection (defaults to the user's collection)
    #[arg(short, long)]
    pub collection: Option<String>,

    /// User the documents belong to
    #[arg(short, long)]
    pub user: Option<String>,

    /// Replace the collection if it already exists
    #[arg(long)]
    pub overwrite: bool,

    /// Replace earlier chunks of the same file instead of adding
    #[arg(long)]
    pub replace: bool,

    /// Store each file as a single chunk
    #[arg(long)]
    pub no_split: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct FileOutcome {
    path: String,
    file_id: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection: Option<String>,
    chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = open_service(config)?;
        let files = collect_files(&self.paths);
        if files.is_empty() {
            return Err(AppError::Config("No files found to ingest".to_string()));
        }

        tracing::info!("Ingesting {} files", files.len());
        let mut outcomes = Vec::with_capacity(files.len());

        for path in files {
            let loaded = match load_file(&path) {
                Ok(loaded) => loaded,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    outcomes.push(FileOutcome {
                        path: path.display().to_string(),
                        file_id: String::new(),
                        status: "skipped",
                        collection: None,
                        chunks: 0,
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };

            let request = self.request(&loaded);
            let file_id = request.file_id.clone();
            match service.process_document(request).await {
                Ok(response) => outcomes.push(FileOutcome {
                    path: path.display().to_string(),
                    file_id,
                    status: if response.success { "inserted" } else { "exists" },
                    collection: Some(response.collection),
                    chunks: response.chunks,
                    error: None,
                }),
                Err(e) if e.is_recoverable() => outcomes.push(FileOutcome {
                    path: path.display().to_string(),
                    file_id,
                    status: "skipped",
                    collection: None,
                    chunks: 0,
                    error: Some(e.to_string()),
                }),
                Err(e) => return Err(e),
            }
        }

        if self.json {
            return print_json(&outcomes);
        }

        for outcome in &outcomes {
            match &outcome.error {
                Some(error) => println!("{:<9} {} ({})", outcome.status, outcome.path, error),
                None => println!(
                    "{:<9} {} -> {} ({} chunks)",
                    outcome.status,
                    outcome.path,
                    outcome.collection.as_deref().unwrap_or("-"),
                    outcome.chunks
                ),
            }
        }
        Ok(())
    }

    fn request(&self, loaded: &LoadedFile) -> DocumentRequest {
        let mut request = DocumentRequest::new(
            loaded.file_id(),
            loaded.name.clone(),
            loaded.content.clone(),
        );
        request.collection = self.collection.clone();
        request.user_id = self.user.clone();
        request.overwrite = self.overwrite;
        request.replace = self.replace;
        request.split = !self.no_split;
        request.meta.insert(
            "path".to_string(),
            loaded.path.to_string_lossy().into_owned().into(),
        );
        request
    }
}

#[derive(Args, Debug)]
pub struct TextCommand {
    /// Display name stored with the text
    #[arg(short, long)]
    pub name: String,

    /// The text to ingest
    #[arg(long)]
    pub content: String,

    /// Target collection (defaults to the user's collection)
    #[arg(short, long)]
    pub collection: Option<String>,

    /// User the text belongs to
    #[arg(short, long)]
    pub user: Option<String>,

    /// Session id recorded with the text
    #[arg(long)]
    pub session: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl TextCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = open_service(config)?;
        let response = service
            .process_text(
                &self.name,
                &self.content,
                self.collection.as_deref(),
                self.user.as_deref(),
                self.session.as_deref(),
            )
            .await?;

        if self.json {
            return print_json(&response);
        }

        println!(
            "Stored '{}' in {} ({} chunks)",
            self.name, response.collection, response.chunks
        );
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct AttachCommand {
    /// Id of a file already indexed in the user's collection
    #[arg(long)]
    pub file_id: String,

    /// Display name stored with the chunks
    #[arg(short, long)]
    pub name: String,

    /// Collection receiving the chunks
    #[arg(short, long)]
    pub collection: String,

    /// Owner of the source collection
    #[arg(short, long)]
    pub user: String,

    /// Session id recorded on every chunk
    #[arg(long)]
    pub session: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl AttachCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = open_service(config)?;

        let mut request = DocumentRequest::new(self.file_id.clone(), self.name.clone(), String::new());
        request.collection = Some(self.collection.clone());
        request.user_id = Some(self.user.clone());
        request.session_id = self.session.clone();
        request.reuse_indexed = true;

        let response = service.process_document(request).await?;

        if self.json {
            return print_json(&response);
        }

        println!(
            "Attached {} to {} ({} chunks)",
            self.file_id, response.collection, response.chunks
        );
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct BatchCommand {
    /// Files or directories to ingest as one batch
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Target collection (defaults to the user's collection)
    #[arg(short, long)]
    pub collection: Option<String>,

    /// User the documents belong to
    #[arg(short, long)]
    pub user: Option<String>,

    /// Session id recorded on every chunk
    #[arg(long)]
    pub session: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl BatchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = open_service(config)?;

        let files: Vec<_> = collect_files(&self.paths)
            .into_iter()
            .filter_map(|path| match load_file(&path) {
                Ok(loaded) => Some(loaded.into_batch_file(self.user.as_deref())),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    None
                }
            })
            .collect();

        if files.is_empty() {
            return Err(AppError::Config("No readable files found".to_string()));
        }

        let names: Vec<(String, String)> = files
            .iter()
            .map(|f| (f.file_id.clone(), f.filename.clone()))
            .collect();

        let response = service
            .process_batch(
                &files,
                self.collection.as_deref(),
                self.session.as_deref(),
                self.user.as_deref(),
            )
            .await?;

        if self.json {
            return print_json(&response);
        }

        for result in &response.results {
            let name = names
                .iter()
                .find(|(id, _)| *id == result.file_id)
                .map(|(_, name)| name.as_str())
                .unwrap_or(result.file_id.as_str());
            let status = result.status.as_str();
            match &result.error {
                Some(error) => println!("{:<17} {} ({})", status, name, error),
                None => println!("{:<17} {}", status, name),
            }
        }
        let completed = response
            .results
            .iter()
            .filter(|r| r.status == BatchStatus::Completed)
            .count();
        println!(
            "\n{} completed, {} not stored",
            completed,
            response.errors.len()
        );
        Ok(())
    }
}
