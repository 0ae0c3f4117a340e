//! Retrieval pipeline for government policy documents.
//!
//! Documents are loaded, chunked, embedded and kept in a shared vector index
//! persisted to SQLite. Questions are routed between the indexed documents
//! and a live lookup of executive orders, and answered with citations.
//!
//! # Example
//! ```no_run
//! use navigator_knowledge::{KnowledgeConfig, Navigator};
//!
//! # async fn example() -> navigator_core::AppResult<()> {
//! let navigator = Navigator::builder(KnowledgeConfig::default())
//!     .workspace(".")
//!     .build()?;
//! navigator.sync_initial().await?;
//!
//! let answer = navigator.query("What does the telework policy require?").await?;
//! println!("{}", answer.answer);
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod loader;
pub mod navigator;
pub mod progress;
pub mod rag;
pub mod registry;
pub mod retriever;
pub mod retry;
pub mod router;
pub mod sources;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use chunk::{Chunk, ChunkConfig, ChunkId, ChunkPipeline};
pub use config::{load_config, save_config, KnowledgeConfig, RegistryConfig};
pub use embeddings::{EmbeddingClient, EmbeddingConfig, EmbeddingProvider};
pub use index::{IndexSnapshot, RetrievalResult, ScoredChunk, SharedIndex, VectorIndex};
pub use loader::DocumentFormat;
pub use navigator::{Navigator, NavigatorBuilder};
pub use progress::{ProgressEvent, ProgressReporter};
pub use rag::{AnswerResult, Citation, CitationKind, Query};
pub use registry::{
    FederalRegisterClient, InstrumentRegistry, InstrumentState, InstrumentStatus, RegisterRecord,
};
pub use retriever::Retriever;
pub use router::{QueryRouter, Route, RouteDecision};
pub use sources::{
    DirectorySource, DocumentSource, InMemorySource, SourceFile, SourceListing, UnreadableFile,
};
pub use store::SqliteStore;
pub use types::{
    Document, DocumentId, DocumentSummary, EmbeddingHealth, IndexStats, IngestReport,
    IngestedDocument, RebuildReport,
};
