//! Generation client construction.

use std::sync::Arc;
use std::time::Duration;

use crate::client::LlmClient;
use crate::providers::{ollama, ExtractiveClient, OllamaClient};
use crate::types::ProviderType;
use navigator_core::config::{AppConfig, ProviderConfig};
use navigator_core::{AppError, AppResult};

/// Create a generation client by provider name.
///
/// `endpoint` and `timeout` only apply to model-server providers.
///
/// # Errors
/// Returns `AppError::Llm` if the provider is unknown or its HTTP client
/// cannot be created.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    timeout: Option<Duration>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Llm(format!("Unknown provider: {}", provider)))?;

    tracing::debug!("Creating {} generation client", provider_type.as_str());

    let client: Arc<dyn LlmClient> = match provider_type {
        ProviderType::Ollama => {
            let base_url = endpoint.unwrap_or(ollama::DEFAULT_ENDPOINT);
            Arc::new(match timeout {
                Some(timeout) => OllamaClient::with_timeout(base_url, timeout)?,
                None => OllamaClient::with_base_url(base_url)?,
            })
        }
        ProviderType::Extractive => Arc::new(ExtractiveClient::new()),
    };
    Ok(client)
}

/// Create the generation client the application config selects, with the
/// provider settings from its config file.
pub fn client_for(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    match config.get_provider_config(&config.provider) {
        Some(ProviderConfig::Extractive {
            max_passage_chars: Some(chars),
        }) if ProviderType::parse(&config.provider) == Some(ProviderType::Extractive) => {
            Ok(Arc::new(ExtractiveClient::with_max_passage_chars(*chars)))
        }
        _ => create_client(
            &config.provider,
            config.provider_endpoint(),
            config.provider_timeout_secs().map(Duration::from_secs),
        ),
    }
}
