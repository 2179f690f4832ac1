//! Maintenance commands.

use super::{open_service, print_json};
use clap::Args;
use docindex_core::{config::AppConfig, AppError, AppResult};
use docindex_knowledge::collections::{kb_collection_name, user_collection_name};
use docindex_knowledge::metadata::FILE_ID_KEY;
use docindex_knowledge::Filter;
use serde_json::json;

#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Collection to delete from
    #[arg(short, long)]
    pub collection: String,

    /// Remove every chunk of this file
    #[arg(long, required_unless_present = "all")]
    pub file_id: Option<String>,

    /// Drop the whole collection
    #[arg(long, conflicts_with = "file_id")]
    pub all: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl DeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let service = open_service(config)?;
        let filter = match &self.file_id {
            Some(file_id) => Filter::eq(FILE_ID_KEY, file_id.as_str()),
            None => Filter::All,
        };

        let existed = if self.all {
            let existed = service.store().has_collection(&self.collection).await?;
            service.store().delete_collection(&self.collection).await?;
            existed
        } else {
            service.delete(&self.collection, &filter).await?
        };

        if self.json {
            return print_json(&json!({ "collection": self.collection, "deleted": existed }));
        }

        if existed {
            println!("Deleted from {}", self.collection);
        } else {
            println!("Collection {} not found", self.collection);
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ResetCommand {
    /// Confirm dropping every collection
    #[arg(long)]
    pub yes: bool,
}

impl ResetCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        if !self.yes {
            return Err(AppError::Config(
                "Refusing to reset the vector store without --yes".to_string(),
            ));
        }

        let service = open_service(config)?;
        service.reset_all().await?;
        println!("Vector store reset");
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct CollectionNameCommand {
    /// User id for a personal collection
    #[arg(long, conflicts_with_all = ["kb_name", "kb_id"])]
    pub user: Option<String>,

    /// Knowledge base name
    #[arg(long, requires = "kb_id")]
    pub kb_name: Option<String>,

    /// Knowledge base id
    #[arg(long, requires = "kb_name")]
    pub kb_id: Option<String>,
}

impl CollectionNameCommand {
    pub fn execute(&self) -> AppResult<()> {
        println!("{}", self.resolve()?);
        Ok(())
    }

    fn resolve(&self) -> AppResult<String> {
        match (&self.user, &self.kb_name, &self.kb_id) {
            (Some(user), _, _) => Ok(user_collection_name(user)),
            (None, Some(name), Some(id)) => Ok(kb_collection_name(name, id)),
            _ => Err(AppError::Config(
                "Provide --user or both --kb-name and --kb-id".to_string(),
            )),
        }
    }
}
