//! Chunking pipeline for policy documents.
//!
//! This module splits each text unit of a document into bounded passages:
//! - Paragraphs (runs of blank lines) are the preferred boundaries
//! - Oversized paragraphs fall back to a sliding window with overlap
//! - Byte ranges and overlap are recorded so the unit text can be rebuilt

mod metadata;
mod pipeline;
pub mod splitters;

pub use metadata::calculate_hash;
pub use pipeline::{ChunkConfig, ChunkPipeline};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::DocumentId;

/// Identity of a chunk: its document and its position in that document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    pub document_id: DocumentId,
    pub index: usize,
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.document_id, self.index)
    }
}

/// A bounded passage of a document, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Owning document
    pub document_id: DocumentId,

    /// Source filename, kept for attribution
    pub filename: String,

    /// Position in the document (contiguous from 0 across all units)
    pub index: usize,

    /// Index of the text unit this chunk was cut from
    pub unit: usize,

    /// Label of that unit ("row 3"), if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Chunk text content
    pub text: String,

    /// Byte range within the unit text
    pub byte_range: (usize, usize),

    /// Leading bytes of `text` repeated from the previous chunk of the unit
    pub overlap: usize,
}

impl Chunk {
    pub fn id(&self) -> ChunkId {
        ChunkId {
            document_id: self.document_id.clone(),
            index: self.index,
        }
    }

    /// The part of the text not shared with the previous chunk.
    pub fn fresh_text(&self) -> &str {
        &self.text[self.overlap..]
    }
}
