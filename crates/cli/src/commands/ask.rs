//! Ask command handler.
//!
//! Routes the question, retrieves passages and prints the grounded answer
//! with its citations.

use super::{open_navigator, print_json};
use clap::Args;
use navigator_core::{config::AppConfig, AppError, AppResult};
use std::path::PathBuf;

/// Ask a question about the indexed policies
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.question_text()?;
        let navigator = open_navigator(config)?;
        let result = navigator.query(&question).await?;

        if self.json {
            return print_json(&result);
        }

        println!("{}", result.answer);
        if !result.citations.is_empty() {
            println!();
            println!("Sources:");
            for citation in &result.citations {
                println!("  - {}", citation);
            }
        }
        tracing::debug!("Request {} answered via {}", result.request_id, result.route);

        Ok(())
    }

    fn question_text(&self) -> AppResult<String> {
        let text = match (&self.question, &self.file) {
            (Some(question), _) => question.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => return Err(AppError::Config("No question provided".to_string())),
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(AppError::Config("Question is empty".to_string()));
        }
        Ok(text)
    }
}
