//! Command handlers for the navigator CLI.
//!
//! One submodule per subcommand; they share the navigator setup below.

pub mod ask;
pub mod documents;
pub mod health;
pub mod ingest;
pub mod rebuild;
pub mod remove;
pub mod stats;
pub mod status;
pub mod sync;

pub use ask::AskCommand;
pub use documents::DocumentsCommand;
pub use health::HealthCommand;
pub use ingest::IngestCommand;
pub use rebuild::RebuildCommand;
pub use remove::RemoveCommand;
pub use stats::StatsCommand;
pub use status::StatusCommand;
pub use sync::SyncCommand;

use navigator_core::{config::AppConfig, AppResult};
use navigator_knowledge::{load_config, Navigator, NavigatorBuilder, ProgressReporter};
use serde::Serialize;
use std::sync::Arc;

/// Builder for the workspace navigator with the configured generation client.
pub fn navigator_builder(config: &AppConfig) -> AppResult<NavigatorBuilder> {
    let knowledge = load_config(&config.workspace)?;
    let llm = navigator_llm::client_for(config)?;

    tracing::debug!(
        "Using generation provider '{}' (model: {})",
        config.provider,
        config.model
    );

    Ok(Navigator::builder(knowledge)
        .workspace(&config.workspace)
        .llm(llm, config.model.clone()))
}

/// Open the workspace navigator.
pub fn open_navigator(config: &AppConfig) -> AppResult<Navigator> {
    navigator_builder(config)?.build()
}

/// Reporter printing ingestion progress to stderr, unless output is JSON.
pub fn progress_reporter(json: bool) -> ProgressReporter {
    if json {
        ProgressReporter::noop()
    } else {
        ProgressReporter::new(Arc::new(|event| eprintln!("{}", event.format_simple())))
    }
}

pub fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_ingest_report(report: &navigator_knowledge::IngestReport) {
    for doc in &report.succeeded {
        let verb = if doc.replaced { "Replaced" } else { "Indexed" };
        println!("  {} {} ({} chunks)", verb, doc.filename, doc.chunks);
    }
    for filename in &report.skipped {
        println!("  Unchanged {}", filename);
    }
    for failure in &report.failed {
        println!("  Failed {} [{}]: {}", failure.filename, failure.kind, failure.error);
    }
    println!(
        "{} indexed, {} unchanged, {} failed, {} chunks in {:.1}s",
        report.succeeded.len(),
        report.skipped.len(),
        report.failed.len(),
        report.chunks_indexed(),
        report.duration_secs
    );
}
