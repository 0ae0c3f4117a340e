//! Health command handler.

use super::{open_navigator, print_json};
use clap::Args;
use navigator_core::{config::AppConfig, AppResult};

/// Check that the embedding service is reachable
#[derive(Args, Debug)]
pub struct HealthCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HealthCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing health command");

        let navigator = open_navigator(config)?;
        navigator.verify_index()?;
        let health = navigator.check_embeddings().await?;

        if self.json {
            return print_json(&health);
        }

        println!("Embedding provider: {}", health.provider);
        println!("Model: {}", health.model);
        println!("Dimensions: {}", health.dimensions);
        println!("Index: ok");
        Ok(())
    }
}
