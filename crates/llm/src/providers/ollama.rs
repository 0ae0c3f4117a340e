//! Ollama generation provider.
//!
//! Calls `POST /api/generate` with streaming disabled, so each answer arrives
//! as a single JSON object.
//! API reference: https://github.com/ollama/ollama/blob/main/docs/api.md

use std::time::Duration;

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use navigator_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const GENERATE_PATH: &str = "/api/generate";

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<SamplingOptions>,
    stream: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct SamplingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    model: String,
    response: String,
    #[serde(default = "reply_done")]
    done: bool,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

fn reply_done() -> bool {
    true
}

impl From<GenerateReply> for LlmResponse {
    fn from(reply: GenerateReply) -> Self {
        LlmResponse {
            content: reply.response,
            model: reply.model,
            usage: LlmUsage::new(reply.prompt_eval_count, reply.eval_count),
            done: reply.done,
        }
    }
}

/// Generation client for a local or remote Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Client for the default local server.
    pub fn new() -> AppResult<Self> {
        Self::with_base_url(DEFAULT_ENDPOINT)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> AppResult<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::Llm(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn body<'a>(request: &'a LlmRequest) -> GenerateBody<'a> {
        let options = (request.temperature.is_some() || request.max_tokens.is_some()).then(|| {
            SamplingOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            }
        });

        GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            options,
            stream: false,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    #[tracing::instrument(skip_all, fields(model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(
            "Generating from a {} char prompt with {} passages",
            request.prompt.len(),
            request.passages.len()
        );

        let url = format!("{}{}", self.base_url, GENERATE_PATH);
        let response = self
            .client
            .post(&url)
            .json(&Self::body(request))
            .send()
            .await
            .map_err(|e| {
                AppError::GenerationUnavailable(format!("Failed to reach Ollama at {}: {}", url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned {}: {}", status, detail);
            return Err(AppError::GenerationUnavailable(format!(
                "Ollama returned {}: {}",
                status, detail
            )));
        }

        let reply: GenerateReply = response.json().await.map_err(|e| {
            AppError::GenerationUnavailable(format!("Failed to parse Ollama reply: {}", e))
        })?;

        tracing::info!(
            "Ollama generated {} chars ({} prompt tokens, {} completion tokens)",
            reply.response.len(),
            reply.prompt_eval_count,
            reply.eval_count
        );
        Ok(reply.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = OllamaClient::with_base_url("http://gpu-box:11434/").unwrap();
        assert_eq!(client.base_url(), "http://gpu-box:11434");
        assert_eq!(OllamaClient::new().unwrap().base_url(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_sampling_options_only_when_set() {
        let plain = LlmRequest::new("Hello", "llama3");
        assert!(OllamaClient::body(&plain).options.is_none());

        let tuned = LlmRequest::new("Hello", "llama3")
            .with_temperature(0.1)
            .with_max_tokens(256);
        assert_eq!(
            OllamaClient::body(&tuned).options,
            Some(SamplingOptions {
                temperature: Some(0.1),
                num_predict: Some(256),
            })
        );
    }

    #[tokio::test]
    async fn test_complete_parses_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "llama3",
                "system": "Answer from the context.",
                "stream": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"model":"llama3","response":"Annual review is required.","done":true,"prompt_eval_count":42,"eval_count":7}"#,
            )
            .create_async()
            .await;

        let client = OllamaClient::with_base_url(server.url()).unwrap();
        let request = LlmRequest::new("What does Policy X require?", "llama3")
            .with_system("Answer from the context.");
        let response = client.complete(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "Annual review is required.");
        assert_eq!(response.usage.prompt_tokens, 42);
        assert_eq!(response.usage.completion_tokens, 7);
        assert!(response.done);
    }

    #[tokio::test]
    async fn test_server_error_is_generation_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let client = OllamaClient::with_base_url(server.url()).unwrap();
        match client.complete(&LlmRequest::new("Hello", "llama3")).await {
            Err(AppError::GenerationUnavailable(msg)) => assert!(msg.contains("model not loaded")),
            other => panic!("Unexpected result: {:?}", other.map(|r| r.content)),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_generation_unavailable() {
        let client = OllamaClient::with_timeout("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let result = client.complete(&LlmRequest::new("Hello", "llama3")).await;
        assert!(matches!(result, Err(AppError::GenerationUnavailable(_))));
    }
}
