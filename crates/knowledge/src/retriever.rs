//! Question to ranked chunks.

use crate::embeddings::EmbeddingClient;
use crate::index::{RetrievalResult, VectorIndex};
use navigator_core::AppResult;
use std::sync::Arc;

/// Embeds a question and searches the index with a fixed `top_k`.
#[derive(Clone)]
pub struct Retriever {
    embedder: EmbeddingClient,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: EmbeddingClient, index: Arc<dyn VectorIndex>, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve the chunks most similar to `question`.
    ///
    /// An empty index short-circuits without calling the embedding service.
    pub async fn retrieve(&self, question: &str) -> AppResult<RetrievalResult> {
        if self.index.is_empty() {
            tracing::debug!("Index is empty, skipping retrieval");
            return Ok(RetrievalResult::empty());
        }

        let query = self.embedder.embed(question).await?;
        let result = self.index.search(&query, self.top_k)?;

        match result.top_score() {
            Some(top) => tracing::info!(
                "Retrieved {} relevant chunks (top score: {:.3})",
                result.len(),
                top
            ),
            None => tracing::info!("No relevant chunks found above the similarity floor"),
        }

        Ok(result)
    }
}
