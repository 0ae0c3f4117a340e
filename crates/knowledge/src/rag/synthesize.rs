//! Answer synthesis.
//!
//! Assembles a bounded context from retrieved chunks and lookup facts, calls
//! the generation service and reports which sources made it into the context.

use crate::index::RetrievalResult;
use crate::rag::types::{AnswerResult, Citation, Query};
use crate::registry::InstrumentStatus;
use crate::retry::{with_retries, RetryPolicy};
use crate::router::Route;
use navigator_core::{AppError, AppResult};
use navigator_llm::{LlmClient, LlmRequest, Passage};
use std::sync::Arc;

const SEGMENT_SEPARATOR: &str = "\n\n---\n\n";

/// The generation context and the sources it contains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBlock {
    pub passages: Vec<Passage>,
    pub citations: Vec<Citation>,
}

impl ContextBlock {
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Rendered context for the prompt.
    pub fn render(&self) -> String {
        self.passages
            .iter()
            .map(|p| format!("[{}]\n{}", p.source, p.text))
            .collect::<Vec<_>>()
            .join(SEGMENT_SEPARATOR)
    }

    fn cite(&mut self, citation: Citation) {
        if !self.citations.iter().any(|c| c.name == citation.name) {
            self.citations.push(citation);
        }
    }
}

/// Label of the lookup segment in the context.
pub fn lookup_source(status: &InstrumentStatus) -> String {
    format!("Federal Register - EO {}", status.number)
}

/// Build the context block within `max_chars` characters of chunk text.
///
/// Chunks are taken in ranking order. A chunk that does not fit is dropped,
/// except the first one, which is cut to the budget. Lookup facts are always
/// appended after the chunks.
pub fn build_context(
    retrieval: &RetrievalResult,
    lookup: Option<&InstrumentStatus>,
    max_chars: usize,
) -> ContextBlock {
    let mut block = ContextBlock::default();
    let mut used = 0;

    for (i, scored) in retrieval.chunks.iter().enumerate() {
        let text = scored.chunk.text.trim();
        let len = text.chars().count();

        let text = if used + len <= max_chars {
            text.to_string()
        } else if i == 0 {
            text.chars().take(max_chars).collect()
        } else {
            tracing::debug!(
                "Dropping chunk {} from context, budget of {} chars exhausted",
                scored.chunk.id(),
                max_chars
            );
            continue;
        };

        used += text.chars().count();
        block
            .passages
            .push(Passage::new(scored.chunk.filename.clone(), text));
        block.cite(Citation::document(scored.chunk.filename.clone()));
    }

    if let Some(status) = lookup {
        block
            .passages
            .push(Passage::new(lookup_source(status), status.render_facts()));
        block.cite(Citation::lookup(status.number.clone()));
    }

    block
}

fn build_system_prompt(low_confidence: bool, has_lookup: bool) -> String {
    let mut prompt = String::from(
        "You are a public policy assistant answering questions about government \
         regulations, policies and executive orders.\n\n",
    );

    if low_confidence {
        prompt.push_str(
            "Note: The retrieved information may not directly answer this question. \
             Be cautious and clear about what the documents do and do not state.\n\n",
        );
    }

    if has_lookup {
        prompt.push_str(
            "The context includes current status information from the Federal Register. \
             Treat it as authoritative for whether an order is in effect.\n\n",
        );
    }

    prompt.push_str(
        "Instructions:\n\
         - Answer based only on the context provided\n\
         - Mention the source name when stating a fact\n\
         - If the context suggests but does not confirm something, express that nuance clearly\n\
         - If the context does not contain the answer, say so\n\
         - Keep your response concise and factual\n",
    );

    prompt
}

/// Writes answers from a grounding context.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmClient>,
    model: String,
    max_context_chars: usize,
    confidence_threshold: f32,
    policy: RetryPolicy,
}

impl AnswerSynthesizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        max_context_chars: usize,
        confidence_threshold: f32,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            max_context_chars,
            confidence_threshold,
            policy,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.llm.provider_name()
    }

    /// Answer `query` from the retrieved chunks and lookup facts.
    ///
    /// With nothing to ground on the generation service is not called.
    pub async fn synthesize(
        &self,
        query: &Query,
        route: Route,
        retrieval: &RetrievalResult,
        lookup: Option<&InstrumentStatus>,
    ) -> AppResult<AnswerResult> {
        let context = build_context(retrieval, lookup, self.max_context_chars);

        if context.is_empty() {
            tracing::info!(
                "No grounding for request {}, answering without generation",
                query.request_id
            );
            return Ok(AnswerResult::insufficient(query, route));
        }

        let low_confidence = retrieval
            .top_score()
            .is_some_and(|s| s < self.confidence_threshold);

        tracing::debug!(
            "Generating answer for request {} with {} passages (provider: {}, low_confidence: {})",
            query.request_id,
            context.passages.len(),
            self.llm.provider_name(),
            low_confidence
        );

        let prompt = format!(
            "User question:\n{}\n\nRelevant context:\n{}",
            query.text,
            context.render()
        );
        let request = LlmRequest::new(prompt, self.model.clone())
            .with_system(build_system_prompt(low_confidence, lookup.is_some()))
            .with_temperature(0.3)
            .with_max_tokens(1000)
            .with_passages(context.passages.clone());

        let response = with_retries(
            self.policy,
            "Answer generation",
            AppError::GenerationUnavailable,
            || async {
                self.llm.complete(&request).await.map_err(|e| match e {
                    AppError::GenerationUnavailable(_) => e,
                    other => AppError::GenerationUnavailable(other.to_string()),
                })
            },
        )
        .await
        .map_err(|e| {
            tracing::error!("Answer generation failed for request {}: {}", query.request_id, e);
            e
        })?;

        Ok(AnswerResult {
            answer: response.content,
            citations: context.citations,
            route,
            request_id: query.request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::index::ScoredChunk;
    use crate::rag::types::CitationKind;
    use crate::registry::InstrumentState;
    use crate::types::DocumentId;
    use navigator_llm::ExtractiveClient;
    use std::time::Duration;

    fn scored(filename: &str, index: usize, text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                document_id: DocumentId::from_filename(filename),
                filename: filename.to_string(),
                index,
                unit: 0,
                label: None,
                text: text.to_string(),
                byte_range: (0, text.len()),
                overlap: 0,
            },
            score,
        }
    }

    fn status() -> InstrumentStatus {
        InstrumentStatus {
            number: "14067".to_string(),
            title: "Ensuring Responsible Development of Digital Assets".to_string(),
            effective_date: Some("2022-03-14".to_string()),
            status: InstrumentState::Revoked,
            html_url: None,
            amendments: vec![],
            revocations: vec![],
        }
    }

    #[test]
    fn test_context_drops_chunks_over_budget() {
        let retrieval = RetrievalResult {
            chunks: vec![
                scored("a.txt", 0, "aaaaaaaaaa", 0.9),
                scored("b.txt", 0, "bbbbbbbbbbbbbbbbbbbb", 0.8),
                scored("c.txt", 0, "cccc", 0.7),
            ],
        };

        let block = build_context(&retrieval, None, 15);
        let names: Vec<&str> = block.citations.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(names, vec!["a.txt", "c.txt"]);
        assert_eq!(block.passages[1].text, "cccc");
    }

    #[test]
    fn test_first_chunk_is_truncated_not_dropped() {
        let retrieval = RetrievalResult {
            chunks: vec![scored("long.txt", 0, "abcdefghij", 0.9)],
        };

        let block = build_context(&retrieval, None, 4);
        assert_eq!(block.passages[0].text, "abcd");
        assert_eq!(block.citations, vec![Citation::document("long.txt")]);
    }

    #[test]
    fn test_citations_dedup_in_context_order() {
        let retrieval = RetrievalResult {
            chunks: vec![
                scored("b.txt", 1, "beta one", 0.9),
                scored("a.txt", 0, "alpha", 0.8),
                scored("b.txt", 0, "beta zero", 0.7),
            ],
        };

        let block = build_context(&retrieval, Some(&status()), 1000);

        assert_eq!(
            block.citations,
            vec![
                Citation::document("b.txt"),
                Citation::document("a.txt"),
                Citation::lookup("14067"),
            ]
        );
        assert_eq!(block.passages.len(), 4);
        assert_eq!(block.passages[3].source, "Federal Register - EO 14067");
    }

    #[test]
    fn test_lookup_is_kept_with_zero_budget_left() {
        let retrieval = RetrievalResult {
            chunks: vec![scored("a.txt", 0, "abcdef", 0.9)],
        };

        let block = build_context(&retrieval, Some(&status()), 3);
        assert_eq!(block.citations.len(), 2);
        assert_eq!(block.citations[1].kind, CitationKind::ExternalLookup);
    }

    #[test]
    fn test_system_prompt() {
        assert!(build_system_prompt(true, false).contains("Be cautious"));
        assert!(!build_system_prompt(false, false).contains("Be cautious"));
        assert!(build_system_prompt(false, true).contains("Federal Register"));
    }

    fn synthesizer() -> AnswerSynthesizer {
        AnswerSynthesizer::new(
            Arc::new(ExtractiveClient::new()),
            "extractive",
            6000,
            0.3,
            RetryPolicy::once(Duration::from_secs(5)),
        )
    }

    #[tokio::test]
    async fn test_synthesize_without_grounding() {
        let query = Query::new(1, "What is the capital of Mars?");
        let result = synthesizer()
            .synthesize(&query, Route::DocumentGrounded, &RetrievalResult::empty(), None)
            .await
            .unwrap();

        assert!(result.citations.is_empty());
        assert!(result.answer.starts_with("I could not find enough information"));
    }

    #[tokio::test]
    async fn test_synthesize_with_lookup_only() {
        let query = Query::new(2, "Is Executive Order 14067 still in effect?");
        let result = synthesizer()
            .synthesize(&query, Route::LiveLookup, &RetrievalResult::empty(), Some(&status()))
            .await
            .unwrap();

        assert_eq!(result.citations, vec![Citation::lookup("14067")]);
        assert!(result.answer.contains("Status: Revoked"));
        assert_eq!(result.route, Route::LiveLookup);
    }
}
