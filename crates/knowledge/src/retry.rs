//! Bounded retries with timeout for external service calls.

use navigator_core::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;

/// Initial backoff between attempts; doubles each retry.
const INITIAL_BACKOFF_MS: u64 = 100;

/// Ceiling for a single backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Most retries a configured service may ask for.
pub const MAX_RETRIES: u32 = 10;

/// Timeout and retry bounds for one kind of external call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub attempts: u32,

    /// Bound on each individual attempt
    pub timeout: Duration,

    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, timeout: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            timeout,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// A single attempt with the given timeout.
    pub fn once(timeout: Duration) -> Self {
        Self::new(1, timeout)
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Delay after the given failed attempt (1-based), capped at
    /// `MAX_BACKOFF`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        2_u32
            .checked_pow(attempt.saturating_sub(1))
            .and_then(|factor| self.initial_backoff.checked_mul(factor))
            .map_or(MAX_BACKOFF, |backoff| backoff.min(MAX_BACKOFF))
    }
}

/// Errors worth another attempt: the service may come back.
fn is_transient(error: &AppError) -> bool {
    matches!(
        error,
        AppError::EmbeddingUnavailable(_)
            | AppError::LookupService(_)
            | AppError::GenerationUnavailable(_)
    )
}

/// Run `op` under `policy`, converting an elapsed timeout with `on_timeout`.
///
/// Only transient errors are retried. Dropping the returned future aborts the
/// call in flight.
pub async fn with_retries<T, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    on_timeout: fn(String) -> AppError,
    mut op: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(format!(
                "{} timed out after {:.1}s",
                what,
                policy.timeout.as_secs_f64()
            ))),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.attempts && is_transient(&e) => {
                let backoff = policy.backoff(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}), retrying in {}ms: {}",
                    what,
                    attempt,
                    policy.attempts,
                    backoff.as_millis(),
                    e
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
