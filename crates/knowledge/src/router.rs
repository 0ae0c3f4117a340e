//! Query routing between document retrieval and live instrument lookup.
//!
//! Classification is a keyword heuristic. A miss degrades to document-only
//! grounding, which is always a valid answer path.

use crate::index::RetrievalResult;
use crate::registry::{clean_number, InstrumentRegistry, InstrumentStatus};
use crate::retry::{with_retries, RetryPolicy};
use navigator_core::{AppError, AppResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const IDENTIFIER_PATTERN: &str = r"(?i)(?:\bexecutive\s+order|\bexec\.?\s*order|\be\.\s?o\.|\beo)[\s\-]*(?:no\.?|number|#)?\s*(\d{1,3},\d{3}|\d{4,6})\b";

const STATUS_PATTERN: &str = r"(?i)(?:^\s*(?:is|was|has|have)\b|\b(?:status|in\s+effect|in\s+force|still|current(?:ly)?|active|valid|repeal\w*|revok\w*|rescind\w*|amend\w*|supersed\w*|overturn\w*)\b)";

const CONTENT_PATTERN: &str = r"(?i)\b(?:requir\w*|say\w*|states?|provid\w*|mandat\w*|cover\w*|explain\w*|mean\w*|summar\w*|impact\w*|affect\w*|how|why|what\s+does)\b";

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Retrieved chunks only
    DocumentGrounded,
    /// Live instrument status only
    LiveLookup,
    /// Both
    Hybrid,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::DocumentGrounded => "document_grounded",
            Route::LiveLookup => "live_lookup",
            Route::Hybrid => "hybrid",
        }
    }

    pub fn needs_lookup(&self) -> bool {
        !matches!(self, Route::DocumentGrounded)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub route: Route,

    /// Instrument number, digits only, when the question names one
    pub instrument: Option<String>,
}

/// Compiled routing patterns.
#[derive(Debug, Clone)]
pub struct QueryClassifier {
    identifier: Regex,
    status: Regex,
    content: Regex,
}

impl QueryClassifier {
    pub fn new() -> AppResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| AppError::Config(format!("Invalid routing pattern: {}", e)))
        };

        Ok(Self {
            identifier: compile(IDENTIFIER_PATTERN)?,
            status: compile(STATUS_PATTERN)?,
            content: compile(CONTENT_PATTERN)?,
        })
    }

    /// First instrument number named in the question.
    pub fn instrument(&self, question: &str) -> Option<String> {
        self.identifier
            .captures(question)
            .and_then(|c| c.get(1))
            .map(|m| clean_number(m.as_str()))
    }

    pub fn classify(&self, question: &str) -> RouteDecision {
        let instrument = self.instrument(question);

        let route = match &instrument {
            None => Route::DocumentGrounded,
            Some(_) => {
                let asks_status = self.status.is_match(question);
                let asks_content = self.content.is_match(question);
                match (asks_status, asks_content) {
                    (true, true) => Route::Hybrid,
                    (true, false) => Route::LiveLookup,
                    _ => Route::DocumentGrounded,
                }
            }
        };

        tracing::debug!(
            "Classified question as {} (instrument: {:?})",
            route,
            instrument
        );

        RouteDecision { route, instrument }
    }
}

/// What the synthesizer grounds an answer on.
#[derive(Debug, Clone)]
pub struct Grounding {
    /// Route actually taken, after any degradation
    pub route: Route,
    pub retrieval: RetrievalResult,
    pub lookup: Option<InstrumentStatus>,
}

/// Classifies questions and performs the live lookup they call for.
#[derive(Clone)]
pub struct QueryRouter {
    classifier: QueryClassifier,
    registry: Option<Arc<dyn InstrumentRegistry>>,
    policy: RetryPolicy,
}

impl QueryRouter {
    pub fn new(registry: Option<Arc<dyn InstrumentRegistry>>, policy: RetryPolicy) -> AppResult<Self> {
        Ok(Self {
            classifier: QueryClassifier::new()?,
            registry,
            policy,
        })
    }

    pub fn classify(&self, question: &str) -> RouteDecision {
        self.classifier.classify(question)
    }

    /// Query the registry if the decision calls for it.
    ///
    /// Returns `None` when no lookup is needed or no registry is configured.
    pub async fn lookup(&self, decision: &RouteDecision) -> Option<AppResult<InstrumentStatus>> {
        if !decision.route.needs_lookup() {
            return None;
        }
        let number = decision.instrument.as_deref()?;
        let Some(registry) = self.registry.as_ref() else {
            tracing::warn!(
                "Question asks about Executive Order {} but no registry is configured",
                number
            );
            return None;
        };

        Some(self.lookup_number(registry.as_ref(), number).await)
    }

    /// Look an instrument up directly, under the configured timeout and retries.
    pub async fn lookup_number(
        &self,
        registry: &dyn InstrumentRegistry,
        number: &str,
    ) -> AppResult<InstrumentStatus> {
        with_retries(self.policy, "Registry lookup", AppError::LookupService, || {
            registry.lookup(number)
        })
        .await
    }

    pub fn registry(&self) -> Option<&Arc<dyn InstrumentRegistry>> {
        self.registry.as_ref()
    }

    /// Combine retrieval and lookup outcome into the final grounding.
    ///
    /// A failed or missing lookup degrades to document grounding with no
    /// lookup citation. A successful `LiveLookup` grounds on the lookup
    /// alone; `Hybrid` grounds on both.
    pub fn ground(
        &self,
        decision: &RouteDecision,
        retrieval: RetrievalResult,
        lookup: Option<AppResult<InstrumentStatus>>,
    ) -> Grounding {
        match (decision.route, lookup) {
            (Route::DocumentGrounded, _) | (_, None) => Grounding {
                route: Route::DocumentGrounded,
                retrieval,
                lookup: None,
            },
            (route, Some(Err(e))) => {
                tracing::warn!(
                    "Live lookup for {:?} failed, answering from documents only ({}): {}",
                    decision.instrument,
                    route,
                    e
                );
                Grounding {
                    route: Route::DocumentGrounded,
                    retrieval,
                    lookup: None,
                }
            }
            (Route::LiveLookup, Some(Ok(status))) => Grounding {
                route: Route::LiveLookup,
                retrieval: RetrievalResult::empty(),
                lookup: Some(status),
            },
            (route, Some(Ok(status))) => Grounding {
                route,
                retrieval,
                lookup: Some(status),
            },
        }
    }

    /// Look up (if needed) and ground in one step.
    pub async fn resolve(&self, decision: &RouteDecision, retrieval: RetrievalResult) -> Grounding {
        let lookup = self.lookup(decision).await;
        self.ground(decision, retrieval, lookup)
    }
}
