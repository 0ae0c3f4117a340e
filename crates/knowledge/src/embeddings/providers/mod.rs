//! Embedding provider implementations.

pub mod hashed;
pub mod ollama;

pub use hashed::HashedProvider;
pub use ollama::OllamaProvider;
