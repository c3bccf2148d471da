//! Bounded retry for provider calls
//!
//! Each attempt is capped by a timeout; retryable failures back off
//! exponentially until the retry budget is spent.

use concierge_model::ProviderError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Provider call tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Per-attempt timeout
    pub timeout_ms: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff; doubled per retry
    pub backoff_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 2,
            backoff_ms: 200,
        }
    }
}

/// Timeout-and-retry wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(timeout: Duration, max_retries: u32, backoff: Duration) -> Self {
        Self {
            timeout,
            max_retries,
            backoff,
        }
    }

    /// Single attempt, no retries
    #[must_use]
    pub const fn once(timeout: Duration) -> Self {
        Self::new(timeout, 0, Duration::ZERO)
    }

    #[inline]
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn backoff_for(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << retry.min(16))
    }

    /// Run `call` until it succeeds, fails permanently, or the budget is spent
    ///
    /// # Errors
    /// The last attempt's error; a timed-out attempt is `ProviderError::Timeout`
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retry = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && retry < self.max_retries => {
                    let wait = self.backoff_for(retry);
                    tracing::warn!(operation, attempt = retry + 1, %err, ?wait, "provider call failed, retrying");
                    tokio::time::sleep(wait).await;
                    retry += 1;
                }
                Err(err) => {
                    tracing::warn!(operation, attempts = retry + 1, %err, "provider call failed");
                    return Err(err);
                }
            }
        }
    }
}

impl From<ProviderConfig> for RetryPolicy {
    fn from(config: ProviderConfig) -> Self {
        Self::new(
            Duration::from_millis(config.timeout_ms),
            config.max_retries,
            Duration::from_millis(config.backoff_ms),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        ProviderConfig::default().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(50), max_retries, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let result = fast(2)
            .run("test", || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ProviderError::unavailable("503"))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn budget_is_bounded() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = fast(2)
            .run("test", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::unavailable("503"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = fast(2)
            .run("test", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::invalid_response("garbage"))
            })
            .await;
        assert_eq!(result, Err(ProviderError::invalid_response("garbage")));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let result: Result<(), _> = RetryPolicy::once(Duration::from_millis(10))
            .run("test", || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;
        assert_eq!(result, Err(ProviderError::Timeout(Duration::from_millis(10))));
    }
}
