//! Status command handler.
//!
//! Looks an executive order up in the Federal Register directly, without
//! going through question answering.

use super::{open_navigator, print_json};
use clap::Args;
use navigator_core::{config::AppConfig, AppResult};

/// Look up the current status of an executive order
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Executive order number, e.g. 14067
    pub number: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing status command");

        let navigator = open_navigator(config)?;
        let status = navigator.lookup_instrument(&self.number).await?;

        if self.json {
            print_json(&status)
        } else {
            println!("{}", status.render_facts());
            Ok(())
        }
    }
}
