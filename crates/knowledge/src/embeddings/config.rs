//! Embedding configuration types.

use navigator_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::{RetryPolicy, MAX_RETRIES};

/// Embedding service settings, stored under `embedding:` in `knowledge.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "hashed" or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions; also the index dimension
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Service base URL (ollama only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Bound on each embedding request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts after the first for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_provider() -> String {
    "hashed".to_string()
}

fn default_model() -> String {
    "trigram-v1".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl EmbeddingConfig {
    /// Settings for a local Ollama embedding model.
    pub fn ollama(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            provider: "ollama".to_string(),
            model: model.into(),
            dimensions,
            ..Default::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries.saturating_add(1),
            Duration::from_secs(self.timeout_secs),
        )
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::Config(
                "embedding.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_retries > MAX_RETRIES {
            return Err(AppError::Config(format!(
                "embedding.max_retries must be at most {}, got {}",
                MAX_RETRIES, self.max_retries
            )));
        }
        match self.provider.as_str() {
            "hashed" | "ollama" => Ok(()),
            other => Err(AppError::Config(format!(
                "Unknown embedding provider: '{}'. Supported providers: hashed, ollama",
                other
            ))),
        }
    }
}
