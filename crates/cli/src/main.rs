//! Policy Navigator CLI
//!
//! Main entry point for the navigator command-line tool.
//! Ingests policy documents and answers questions about them.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{
    AskCommand, DocumentsCommand, HealthCommand, IngestCommand, RebuildCommand, RemoveCommand,
    StatsCommand, StatusCommand, SyncCommand,
};
use navigator_core::{
    config::{AppConfig, CliOverrides},
    logging::{self, LogFormat},
};
use std::path::PathBuf;

/// Policy Navigator - question answering over government policy documents
#[derive(Parser, Debug)]
#[command(name = "navigator")]
#[command(about = "Question answering over government policy documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "NAVIGATOR_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "NAVIGATOR_CONFIG")]
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

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Generation provider (ollama, extractive)
    #[arg(short, long, global = true, env = "NAVIGATOR_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "NAVIGATOR_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest documents into the index
    Ingest(IngestCommand),

    /// Ask a question about the indexed policies
    Ask(AskCommand),

    /// Rebuild the index from the initial document folder
    Rebuild(RebuildCommand),

    /// Index new or changed files from the initial document folder
    Sync(SyncCommand),

    /// List indexed documents
    Documents(DocumentsCommand),

    /// Remove a document from the index
    Remove(RemoveCommand),

    /// Look up the current status of an executive order
    Status(StatusCommand),

    /// Check that the embedding service is reachable
    Health(HealthCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ingest(_) => "ingest",
            Commands::Ask(_) => "ask",
            Commands::Rebuild(_) => "rebuild",
            Commands::Sync(_) => "sync",
            Commands::Documents(_) => "documents",
            Commands::Remove(_) => "remove",
            Commands::Status(_) => "status",
            Commands::Health(_) => "health",
            Commands::Stats(_) => "stats",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let overrides = CliOverrides {
        workspace: cli.workspace,
        config_file: cli.config,
        provider: cli.provider,
        model: cli.model,
        log_level: cli.log_level,
        verbose: cli.verbose,
        no_color: cli.no_color,
        log_json: cli.log_json,
    };
    let config = AppConfig::load_with(&overrides).context("Failed to load configuration")?;

    let format = if config.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init_logging_with_format(config.log_level.as_deref(), config.no_color, format)
        .context("Failed to initialize logging")?;

    tracing::info!("Policy Navigator starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;
    config.ensure_navigator_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    // Route to command handlers
    let result = match &cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Rebuild(cmd) => cmd.execute(&config).await,
        Commands::Sync(cmd) => cmd.execute(&config).await,
        Commands::Documents(cmd) => cmd.execute(&config).await,
        Commands::Remove(cmd) => cmd.execute(&config).await,
        Commands::Status(cmd) => cmd.execute(&config).await,
        Commands::Health(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result.with_context(|| format!("navigator {} failed", cli.command.name()))
}
