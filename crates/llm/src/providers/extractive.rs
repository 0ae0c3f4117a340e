//! Extractive generation provider.
//!
//! Answers by quoting the leading text of each grounding passage. It needs no
//! model server, which makes it the fallback for offline use.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use navigator_core::AppResult;

/// Default number of characters quoted from each passage.
pub const DEFAULT_MAX_PASSAGE_CHARS: usize = 200;

/// Client that stitches an answer together from the request passages.
#[derive(Debug, Clone)]
pub struct ExtractiveClient {
    max_passage_chars: usize,
}

impl ExtractiveClient {
    pub fn new() -> Self {
        Self::with_max_passage_chars(DEFAULT_MAX_PASSAGE_CHARS)
    }

    pub fn with_max_passage_chars(max_passage_chars: usize) -> Self {
        Self {
            max_passage_chars: max_passage_chars.max(1),
        }
    }

    fn render(&self, request: &LlmRequest) -> String {
        if request.passages.is_empty() {
            return "I could not find relevant information to answer this question.".to_string();
        }

        let mut answer = String::from("Based on the information I found:");
        for passage in &request.passages {
            let text = passage.text.trim();
            let excerpt: String = text.chars().take(self.max_passage_chars).collect();
            let ellipsis = if excerpt.len() < text.len() { "..." } else { "" };
            answer.push_str(&format!(
                "\n\nFrom {}: {}{}",
                passage.source, excerpt, ellipsis
            ));
        }
        answer
    }
}

impl Default for ExtractiveClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for ExtractiveClient {
    fn provider_name(&self) -> &str {
        "extractive"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(
            "Extracting answer from {} passages",
            request.passages.len()
        );

        let content = self.render(request);
        Ok(LlmResponse {
            content,
            model: "extractive".to_string(),
            usage: LlmUsage::default(),
            done: true,
        })
    }
}
