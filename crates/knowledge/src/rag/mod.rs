//! Retrieval-augmented answering.
//!
//! Turns ranked chunks and live lookup facts into a cited answer.

mod synthesize;
pub mod types;

pub use synthesize::{build_context, lookup_source, AnswerSynthesizer, ContextBlock};
pub use types::{AnswerResult, Citation, CitationKind, Query};
