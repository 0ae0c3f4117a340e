//! Test doubles for the navigator's external services.

use crate::config::KnowledgeConfig;
use crate::embeddings::{EmbeddingClient, EmbeddingProvider};
use crate::navigator::{Navigator, NavigatorBuilder};
use crate::registry::{InstrumentRegistry, InstrumentState, InstrumentStatus, Modification};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use navigator_core::{AppError, AppResult};
use navigator_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Embeds a text as the counts of a fixed keyword vocabulary.
///
/// Keywords match as lowercase substrings, so "requires" counts for
/// "require". Texts without any keyword embed to the zero vector, which
/// scores 0 against everything.
#[derive(Debug)]
pub struct KeywordEmbedder {
    vocabulary: Vec<String>,
    delay: Duration,
    down: AtomicBool,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
            delay: Duration::ZERO,
            down: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long in every call.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        self.vocabulary
            .iter()
            .map(|word| lower.matches(word.as_str()).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn provider_name(&self) -> &str {
        "keyword"
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::EmbeddingUnavailable("connection refused".to_string()));
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// What the scripted registry answers for a number.
#[derive(Debug, Clone)]
pub enum Script {
    Found(InstrumentStatus),
    NotFound,
    Down,
}

/// Registry answering from a fixed script.
#[derive(Debug, Default)]
pub struct ScriptedRegistry {
    scripts: HashMap<String, Script>,
    pub calls: AtomicUsize,
}

impl ScriptedRegistry {
    pub fn with(mut self, number: &str, script: Script) -> Self {
        self.scripts.insert(number.to_string(), script);
        self
    }
}

#[async_trait]
impl InstrumentRegistry for ScriptedRegistry {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn lookup(&self, number: &str) -> AppResult<InstrumentStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.scripts.get(number) {
            Some(Script::Found(status)) => Ok(status.clone()),
            Some(Script::Down) => Err(AppError::LookupService(
                "registry returned 503 Service Unavailable".to_string(),
            )),
            Some(Script::NotFound) | None => Err(AppError::LookupNotFound(format!(
                "Executive Order {}",
                number
            ))),
        }
    }
}

pub fn revoked_14067() -> InstrumentStatus {
    InstrumentStatus {
        number: "14067".to_string(),
        title: "Ensuring Responsible Development of Digital Assets".to_string(),
        effective_date: Some("2022-03-14".to_string()),
        status: InstrumentState::Revoked,
        html_url: Some("https://www.federalregister.gov/d/2022-05471".to_string()),
        amendments: vec![],
        revocations: vec![Modification {
            document_number: Some("2025-02123".to_string()),
            title: "Strengthening American Leadership in Digital Financial Technology".to_string(),
            date: Some("2025-01-31".to_string()),
        }],
    }
}

/// Generation client that records its requests and answers with a fixed text.
#[derive(Debug, Default)]
pub struct RecordingLlm {
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl RecordingLlm {
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<LlmRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmClient for RecordingLlm {
    fn provider_name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(LlmResponse {
            content: "Grounded answer.".to_string(),
            model: request.model.clone(),
            usage: LlmUsage::default(),
            done: true,
        })
    }
}

/// Generation client whose server is down.
#[derive(Debug, Default)]
pub struct FailingLlm;

#[async_trait]
impl LlmClient for FailingLlm {
    fn provider_name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: &LlmRequest) -> AppResult<LlmResponse> {
        Err(AppError::Llm("Failed to connect to Ollama: connection refused".to_string()))
    }
}

pub const VOCABULARY: &[&str] = &[
    "policy x", "require", "review", "annual", "telework", "travel", "executive order", "digital",
];

/// Pipeline config with the registry disabled and no retries.
pub fn config() -> KnowledgeConfig {
    let mut config = KnowledgeConfig::default();
    config.registry.enabled = false;
    config.registry.max_retries = 0;
    config
}

pub fn policy() -> RetryPolicy {
    RetryPolicy::new(1, Duration::from_secs(5))
}

pub fn embedder_client(embedder: Arc<KeywordEmbedder>) -> EmbeddingClient {
    let dimensions = embedder.dimensions();
    EmbeddingClient::new(embedder, dimensions, policy())
}

/// Builder with a keyword embedder and a recording generator.
pub fn builder(embedder: Arc<KeywordEmbedder>, llm: Arc<RecordingLlm>) -> NavigatorBuilder {
    Navigator::builder(config())
        .embedder(embedder_client(embedder))
        .llm(llm, "test-model")
}
