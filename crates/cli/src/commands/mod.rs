//! Command handlers for the docindex CLI.

pub mod admin;
pub mod ingest;
pub mod query;

pub use admin::{CollectionNameCommand, DeleteCommand, ResetCommand};
pub use ingest::{AttachCommand, BatchCommand, IngestCommand, TextCommand};
pub use query::QueryCommand;

use docindex_core::{config::AppConfig, AppResult};
use docindex_knowledge::{load_config, RetrievalService, SqliteStore};
use std::sync::Arc;

/// File name of the vector database inside the state directory.
const VECTOR_DB_FILE: &str = "vectors.sqlite";

/// Open the workspace store and build the service from the config file.
pub(crate) fn open_service(config: &AppConfig) -> AppResult<RetrievalService> {
    config.ensure_state_dir()?;
    let knowledge = load_config(&config.config_path())?;
    let store = SqliteStore::open(&config.state_dir().join(VECTOR_DB_FILE))?;
    RetrievalService::new(knowledge, Arc::new(store))
}

/// Print a serializable value as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
