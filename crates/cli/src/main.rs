//! docindex CLI
//!
//! Command-line boundary for the ingestion and retrieval engine. Vectors live
//! in a SQLite file under the workspace's `.docindex/` directory.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AttachCommand, BatchCommand, CollectionNameCommand, DeleteCommand, IngestCommand,
    QueryCommand, ResetCommand, TextCommand,
};
use docindex_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// docindex - document ingestion and retrieval
#[derive(Parser, Debug)]
#[command(name = "docindex")]
#[command(about = "Index documents into a local vector store and query them", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCINDEX_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(long, global = true, env = "DOCINDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest files one by one
    Ingest(IngestCommand),

    /// Ingest a piece of free text
    Text(TextCommand),

    /// Ingest many files as one batch with per-file status
    Batch(BatchCommand),

    /// Index a file's stored chunks into another collection
    Attach(AttachCommand),

    /// Query one or more collections
    Query(QueryCommand),

    /// Delete a file's chunks from a collection
    Delete(DeleteCommand),

    /// Drop every collection
    Reset(ResetCommand),

    /// Print the collection name for a user or knowledge base
    CollectionName(CollectionNameCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.json_logs,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::debug!("Workspace: {:?}", config.workspace);

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Text(_) => "text",
        Commands::Batch(_) => "batch",
        Commands::Attach(_) => "attach",
        Commands::Query(_) => "query",
        Commands::Delete(_) => "delete",
        Commands::Reset(_) => "reset",
        Commands::CollectionName(_) => "collection-name",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Text(cmd) => cmd.execute(&config).await,
        Commands::Batch(cmd) => cmd.execute(&config).await,
        Commands::Attach(cmd) => cmd.execute(&config).await,
        Commands::Query(cmd) => cmd.execute(&config).await,
        Commands::Delete(cmd) => cmd.execute(&config).await,
        Commands::Reset(cmd) => cmd.execute(&config).await,
        Commands::CollectionName(cmd) => cmd.execute(),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
