//! Stats command handler.

use super::{open_navigator, print_json};
use clap::Args;
use navigator_core::{config::AppConfig, AppResult};

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let navigator = open_navigator(config)?;
        let stats = navigator.stats();

        if self.json {
            return print_json(&stats);
        }

        println!("Documents: {}", stats.documents);
        println!("Chunks: {}", stats.chunks);
        println!("Dimension: {}", stats.dimension);
        println!("Epoch: {}", stats.epoch);
        Ok(())
    }
}
