//! Chunking pipeline orchestrator.

use super::{
    splitters::{ChunkSplitter, ParagraphSplitter},
    Chunk,
};
use crate::types::Document;
use navigator_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Configuration for chunking pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum chunk size in bytes
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Bytes repeated between consecutive windows of an oversized paragraph
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_max_chunk_size() -> usize {
    1500
}

fn default_chunk_overlap() -> usize {
    150
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.max_chunk_size == 0 {
            return Err(AppError::Config(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.max_chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than max_chunk_size ({})",
                self.chunk_overlap, self.max_chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits documents into chunks.
pub struct ChunkPipeline {
    config: ChunkConfig,
    splitter: Box<dyn ChunkSplitter + Send + Sync>,
}

impl ChunkPipeline {
    /// Create a new pipeline with configuration.
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config,
            splitter: Box::new(ParagraphSplitter),
        }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Split every unit of a document into chunks, numbered across units.
    ///
    /// Whitespace-only units produce no chunks.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for unit in &document.units {
            if unit.text.trim().is_empty() {
                continue;
            }

            for span in self.splitter.split(&unit.text, &self.config) {
                chunks.push(Chunk {
                    document_id: document.id.clone(),
                    filename: document.filename.clone(),
                    index: chunks.len(),
                    unit: unit.index,
                    label: unit.label.clone(),
                    text: unit.text[span.start..span.end].to_string(),
                    byte_range: (span.start, span.end),
                    overlap: span.overlap,
                });
            }
        }

        tracing::debug!(
            "Chunked {} into {} chunks ({} units, {} bytes)",
            document.filename,
            chunks.len(),
            document.units.len(),
            document.text.len()
        );

        chunks
    }
}
