//! Error types for Policy Navigator.
//!
//! This module defines a unified error enum shared by every crate in the
//! workspace. Besides the general categories (configuration, I/O,
//! serialization) it carries the retrieval pipeline's own taxonomy so callers
//! can tell a per-file ingestion failure from a degraded lookup or a hard
//! generation failure.

use thiserror::Error;

/// Unified error type for Policy Navigator.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors are represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors outside a generation request (client setup etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base errors that fit no narrower category
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// The file extension or content does not match a known document format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Text could not be recovered from a file of a known format
    #[error("Extraction error ({file}): {message}")]
    Extraction {
        /// File the extraction was attempted on.
        file: String,
        /// A description of the failure.
        message: String,
    },

    /// Transport, auth, or timeout failure talking to the embedding service
    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// A vector's dimension disagrees with the index dimension
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimensionMismatch {
        /// Dimension the index is configured for.
        expected: usize,
        /// Dimension that was actually produced.
        actual: usize,
    },

    /// The index or its backing store violates an invariant; rebuild recommended
    #[error("Index corruption: {0} (rebuild the index to recover)")]
    IndexCorruption(String),

    /// The registry has no instrument with the requested identifier
    #[error("Lookup not found: {0}")]
    LookupNotFound(String),

    /// The registry could not be queried
    #[error("Lookup service error: {0}")]
    LookupService(String),

    /// The generation service failed; there is no degraded answer
    #[error("Generation service unavailable: {0}")]
    GenerationUnavailable(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error degrades a query to reduced context instead of
    /// failing it.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingUnavailable(_)
                | AppError::EmbeddingDimensionMismatch { .. }
                | AppError::IndexCorruption(_)
                | AppError::LookupNotFound(_)
                | AppError::LookupService(_)
        )
    }

    /// Short machine-readable name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Llm(_) => "llm",
            AppError::Knowledge(_) => "knowledge",
            AppError::UnsupportedFormat(_) => "unsupported_format",
            AppError::Extraction { .. } => "extraction",
            AppError::EmbeddingUnavailable(_) => "embedding_unavailable",
            AppError::EmbeddingDimensionMismatch { .. } => "embedding_dimension_mismatch",
            AppError::IndexCorruption(_) => "index_corruption",
            AppError::LookupNotFound(_) => "lookup_not_found",
            AppError::LookupService(_) => "lookup_service",
            AppError::GenerationUnavailable(_) => "generation_unavailable",
            AppError::Serialization(_) => "serialization",
            AppError::Other(_) => "other",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
