//! Sync command handler.

use super::{navigator_builder, print_ingest_report, print_json, progress_reporter};
use clap::Args;
use navigator_core::{config::AppConfig, AppResult};

/// Index new or changed files from the initial document folder
#[derive(Args, Debug)]
pub struct SyncCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SyncCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing sync command");

        let navigator = navigator_builder(config)?
            .progress(progress_reporter(self.json))
            .build()?;
        let report = navigator.sync_initial().await?;

        if self.json {
            print_json(&report)?;
        } else {
            print_ingest_report(&report);
        }

        Ok(())
    }
}
