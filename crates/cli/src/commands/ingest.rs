//! Ingest command handler.

use super::{navigator_builder, print_ingest_report, print_json, progress_reporter};
use clap::Args;
use navigator_core::{config::AppConfig, AppError, AppResult};
use std::path::PathBuf;

/// Ingest documents into the index
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest (PDF, CSV, JSON, text, Markdown)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");
        tracing::debug!("Ingest options: {:?}", self);

        let navigator = navigator_builder(config)?
            .progress(progress_reporter(self.json))
            .build()?;
        let report = navigator.ingest_files(&self.paths).await?;

        if self.json {
            print_json(&report)?;
        } else {
            print_ingest_report(&report);
        }

        // Every file failing is a failed command; partial failure is not
        if report.succeeded.is_empty() && report.skipped.is_empty() && !report.failed.is_empty() {
            return Err(AppError::Other(format!(
                "No documents ingested ({} failed)",
                report.failed.len()
            )));
        }

        Ok(())
    }
}
