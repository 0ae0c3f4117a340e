//! Documents command handler.

use super::{open_navigator, print_json};
use clap::Args;
use navigator_core::{config::AppConfig, AppResult};

/// List indexed documents
#[derive(Args, Debug)]
pub struct DocumentsCommand {
    /// Show chunk counts and ingestion times
    #[arg(short, long)]
    pub detailed: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DocumentsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing documents command");

        let navigator = open_navigator(config)?;

        if self.json {
            return if self.detailed {
                print_json(&navigator.documents())
            } else {
                print_json(&navigator.list_documents())
            };
        }

        if !self.detailed {
            for filename in navigator.list_documents() {
                println!("{}", filename);
            }
            return Ok(());
        }

        let documents = navigator.documents();
        if documents.is_empty() {
            println!("No documents indexed");
            return Ok(());
        }
        for doc in documents {
            println!(
                "{}  {:?}  {} chunks  {}",
                doc.filename,
                doc.format,
                doc.chunk_count,
                doc.ingested_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        Ok(())
    }
}
