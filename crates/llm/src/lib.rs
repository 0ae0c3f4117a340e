//! Generation service integration for Policy Navigator.
//!
//! This crate provides a provider-agnostic abstraction for asking a language
//! model to write an answer from a grounded prompt. Providers implement the
//! [`LlmClient`] trait.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **Extractive**: answers with the leading text of each supplied passage,
//!   no model server required
//!
//! # Example
//! ```no_run
//! use navigator_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new()?;
//! let request = LlmRequest::new("Summarize the telework policy.", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage, Passage};
pub use factory::{client_for, create_client};
pub use providers::{ExtractiveClient, OllamaClient};
pub use types::ProviderType;
