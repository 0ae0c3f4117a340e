//! Rebuild command handler.

use super::{navigator_builder, print_ingest_report, print_json, progress_reporter};
use clap::Args;
use navigator_core::{config::AppConfig, AppResult};

/// Rebuild the index from the initial document folder
#[derive(Args, Debug)]
pub struct RebuildCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RebuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing rebuild command");

        // A rebuild replaces everything, so a corrupt index is no obstacle
        let navigator = navigator_builder(config)?
            .recover_corrupt_index(true)
            .progress(progress_reporter(self.json))
            .build()?;
        let rebuild = navigator.rebuild_index().await?;

        if self.json {
            print_json(&rebuild)?;
        } else {
            print_ingest_report(&rebuild.report);
            println!("Index epoch: {}", rebuild.epoch);
        }

        Ok(())
    }
}
