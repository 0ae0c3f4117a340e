//! Remove command handler.

use super::open_navigator;
use clap::Args;
use navigator_core::{config::AppConfig, AppError, AppResult};

/// Remove a document from the index
#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Filename or document id
    pub name: String,
}

impl RemoveCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing remove command");

        let navigator = open_navigator(config)?;
        match navigator.remove_document(&self.name).await? {
            Some(doc) => {
                println!("Removed {} ({} chunks)", doc.filename, doc.chunk_count);
                Ok(())
            }
            None => Err(AppError::Other(format!("No indexed document named '{}'", self.name))),
        }
    }
}
