//! Answer types.

use crate::router::Route;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A question as handled by the navigator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Monotonically increasing per navigator
    pub request_id: u64,
    pub text: String,
}

impl Query {
    pub fn new(request_id: u64, text: impl Into<String>) -> Self {
        Self {
            request_id,
            text: text.into(),
        }
    }
}

/// Where a cited unit of grounding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationKind {
    Document,
    ExternalLookup,
}

/// A source that was placed in the generation context.
///
/// Documents are named by filename, lookups by instrument number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub name: String,
    pub kind: CitationKind,
}

impl Citation {
    pub fn document(filename: impl Into<String>) -> Self {
        Self {
            name: filename.into(),
            kind: CitationKind::Document,
        }
    }

    pub fn lookup(number: impl Into<String>) -> Self {
        Self {
            name: number.into(),
            kind: CitationKind::ExternalLookup,
        }
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CitationKind::Document => f.write_str(&self.name),
            CitationKind::ExternalLookup => write!(f, "Executive Order {} (Federal Register)", self.name),
        }
    }
}

/// Answer to a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,

    /// Deduplicated by name, in context order
    pub citations: Vec<Citation>,

    /// Route actually taken
    pub route: Route,

    pub request_id: u64,
}

impl AnswerResult {
    /// Answer given when there is nothing to ground on.
    pub fn insufficient(query: &Query, route: Route) -> Self {
        Self {
            answer: format!(
                "I could not find enough information in the indexed policy documents to answer \"{}\".",
                query.text
            ),
            citations: Vec::new(),
            route,
            request_id: query.request_id,
        }
    }

    pub fn cites(&self, name: &str) -> bool {
        self.citations.iter().any(|c| c.name == name)
    }
}
