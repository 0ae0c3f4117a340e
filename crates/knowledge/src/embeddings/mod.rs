//! Embedding client.
//!
//! Wraps an [`EmbeddingProvider`] with the guarantees the index relies on:
//! one vector per input in input order, the configured dimension, unit
//! length, and a bounded retry/timeout budget per call.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use crate::retry::{with_retries, RetryPolicy};
use crate::types::EmbeddingHealth;
use navigator_core::{AppError, AppResult};
use std::sync::Arc;

/// Provider wrapper that validates and normalizes every vector it returns.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    dimensions: usize,
    policy: RetryPolicy,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimensions: usize, policy: RetryPolicy) -> Self {
        Self {
            provider,
            dimensions,
            policy,
        }
    }

    /// Build the configured provider and wrap it.
    pub fn from_config(config: &EmbeddingConfig) -> AppResult<Self> {
        let provider = create_provider(config)?;
        Ok(Self::new(provider, config.dimensions, config.retry_policy()))
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::EmbeddingUnavailable("No embedding returned".to_string()))
    }

    /// Embed texts in one round trip; output is 1:1 with input, in order.
    pub async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            "Embedding {} texts using provider '{}' (model: {})",
            texts.len(),
            self.provider.provider_name(),
            self.provider.model_name()
        );

        let provider = Arc::clone(&self.provider);
        let vectors = with_retries(
            self.policy,
            "Embedding request",
            AppError::EmbeddingUnavailable,
            || {
                let provider = Arc::clone(&provider);
                async move { provider.embed_batch(texts).await }
            },
        )
        .await?;

        // A short or long batch cannot be matched to its chunks
        if vectors.len() != texts.len() {
            tracing::error!(
                "Embedding service returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            );
            return Err(AppError::EmbeddingDimensionMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        vectors
            .into_iter()
            .map(|vector| {
                if vector.len() != self.dimensions {
                    return Err(AppError::EmbeddingDimensionMismatch {
                        expected: self.dimensions,
                        actual: vector.len(),
                    });
                }
                Ok(normalize(vector))
            })
            .collect()
    }

    /// Probe the service with a short text and report what it returns.
    pub async fn health(&self) -> AppResult<EmbeddingHealth> {
        let vector = self.embed("health check").await?;
        Ok(EmbeddingHealth {
            provider: self.provider_name().to_string(),
            model: self.model_name().to_string(),
            dimensions: vector.len(),
        })
    }
}

/// Scale a vector to unit length; zero vectors are returned unchanged.
pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Returns vectors of a fixed length, failing the first `failures` calls.
    #[derive(Debug)]
    struct FixedProvider {
        len: usize,
        extra: usize,
        failures: u32,
        calls: AtomicU32,
    }

    impl FixedProvider {
        fn new(len: usize) -> Self {
            Self {
                len,
                extra: 0,
                failures: 0,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        fn provider_name(&self) -> &str {
            "fixed"
        }

        fn model_name(&self) -> &str {
            "fixed-v1"
        }

        fn dimensions(&self) -> usize {
            self.len
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(AppError::EmbeddingUnavailable("connection reset".to_string()));
            }
            Ok((0..texts.len() + self.extra)
                .map(|i| vec![(i + 1) as f32; self.len])
                .collect())
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(1)).with_backoff(Duration::from_millis(1))
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {}", i)).collect()
    }

    #[tokio::test]
    async fn test_vectors_are_normalized() {
        let client = EmbeddingClient::new(Arc::new(FixedProvider::new(4)), 4, policy());

        let vectors = client.embed_batch(&texts(2)).await.unwrap();
        assert_eq!(vectors.len(), 2);
        for v in &vectors {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_rejected() {
        let client = EmbeddingClient::new(Arc::new(FixedProvider::new(3)), 4, policy());

        let err = client.embed("anything").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::EmbeddingDimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_wrong_count_is_rejected() {
        let provider = FixedProvider {
            extra: 1,
            ..FixedProvider::new(4)
        };
        let client = EmbeddingClient::new(Arc::new(provider), 4, policy());

        let err = client.embed_batch(&texts(2)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::EmbeddingDimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let provider = Arc::new(FixedProvider {
            failures: 2,
            ..FixedProvider::new(4)
        });
        let client = EmbeddingClient::new(provider.clone(), 4, policy());

        assert!(client.embed("retry me").await.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_provider() {
        let provider = Arc::new(FixedProvider::new(4));
        let client = EmbeddingClient::new(provider.clone(), 4, policy());

        assert!(client.embed_batch(&[]).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_health_reports_dimension() {
        let client = EmbeddingClient::from_config(&EmbeddingConfig::default()).unwrap();
        let health = client.health().await.unwrap();

        assert_eq!(health.provider, "hashed");
        assert_eq!(health.dimensions, 384);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
        assert_eq!(normalize(vec![3.0, 4.0]), vec![0.6, 0.8]);
    }
}
