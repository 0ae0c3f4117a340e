//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chunk::calculate_hash;
use crate::loader::DocumentFormat;

/// Separator placed between the text units of a document.
pub const UNIT_SEPARATOR: &str = "\n\n";

/// Stable document identity derived from the source filename.
///
/// Re-ingesting a file with the same name addresses the same document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Derive the id of a document from its filename (first 16 hex chars of SHA-256).
    pub fn from_filename(filename: &str) -> Self {
        let hash = calculate_hash(filename);
        Self(hash[..16].to_string())
    }

    /// Wrap an id read back from storage.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An independently retrievable piece of a document (a CSV row, a JSON record,
/// or the whole text of an unstructured file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextUnit {
    /// Position of the unit within its document
    pub index: usize,

    /// Human-readable sub-identity, e.g. "row 3"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Unit text
    pub text: String,
}

impl TextUnit {
    pub fn new(index: usize, label: Option<String>, text: impl Into<String>) -> Self {
        Self {
            index,
            label,
            text: text.into(),
        }
    }
}

/// A loaded policy document.
///
/// Immutable once built; chunks refer back to it by [`DocumentId`] only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub format: DocumentFormat,

    /// Extracted text: the units joined by [`UNIT_SEPARATOR`]
    pub text: String,

    pub units: Vec<TextUnit>,

    /// SHA-256 of `text`
    pub content_hash: String,

    pub ingested_at: DateTime<Utc>,
}

impl Document {
    /// Build a document from its extracted units.
    pub fn new(filename: impl Into<String>, format: DocumentFormat, units: Vec<TextUnit>) -> Self {
        let filename = filename.into();
        let text = units
            .iter()
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join(UNIT_SEPARATOR);
        let content_hash = calculate_hash(&text);

        Self {
            id: DocumentId::from_filename(&filename),
            filename,
            format,
            text,
            units,
            content_hash,
            ingested_at: Utc::now(),
        }
    }

    /// Build a single-unit document from already extracted text.
    pub fn from_text(
        filename: impl Into<String>,
        format: DocumentFormat,
        text: impl Into<String>,
    ) -> Self {
        Self::new(filename, format, vec![TextUnit::new(0, None, text)])
    }

    /// Metadata view of this document once indexed with `chunk_count` chunks.
    pub fn summary(&self, chunk_count: usize) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            format: self.format,
            content_hash: self.content_hash.clone(),
            ingested_at: self.ingested_at,
            unit_count: self.units.len(),
            text_len: self.text.len(),
            chunk_count,
        }
    }
}

/// What the index remembers about a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub filename: String,
    pub format: DocumentFormat,
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
    pub unit_count: usize,
    pub text_len: usize,
    pub chunk_count: usize,
}

/// A document that made it into the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedDocument {
    pub id: DocumentId,
    pub filename: String,
    pub chunks: usize,

    /// Whether an earlier version of the document was replaced
    pub replaced: bool,
}

/// A file that could not be ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestFailure {
    pub filename: String,

    /// Error category, see `AppError::kind`
    pub kind: String,

    pub error: String,
}

/// Aggregate outcome of a batch ingestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub succeeded: Vec<IngestedDocument>,
    pub failed: Vec<IngestFailure>,

    /// Files whose content was already indexed unchanged
    pub skipped: Vec<String>,

    pub duration_secs: f64,
}

impl IngestReport {
    pub fn record_failure(&mut self, filename: &str, error: &navigator_core::AppError) {
        self.failed.push(IngestFailure {
            filename: filename.to_string(),
            kind: error.kind().to_string(),
            error: error.to_string(),
        });
    }

    pub fn chunks_indexed(&self) -> usize {
        self.succeeded.iter().map(|d| d.chunks).sum()
    }
}

/// Outcome of an index rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildReport {
    pub report: IngestReport,

    /// Rebuild generation that produced the current index
    pub epoch: u64,
}

/// Index statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub epoch: u64,
}

/// Result of probing the embedding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingHealth {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}
