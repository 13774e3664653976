//! Bounded exponential backoff for transient backend failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::provider::EmbeddingProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: usize,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based). Doubling, capped at
    /// 2^5 so a long outage cannot stretch a single sleep past ~16s.
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        Duration::from_millis(self.base_delay_ms * (1 << capped))
    }
}

/// Embed `text`, retrying `Unavailable`/`RateLimited` failures up to the
/// policy's attempt ceiling. Deterministic failures surface immediately.
pub async fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    text: &str,
    policy: &RetryPolicy,
) -> Result<Vec<f32>> {
    let mut attempt = 0usize;
    loop {
        match provider.embed(text).await {
            Ok(vector) => return Ok(vector),
            Err(err) if err.is_retryable() && attempt + 1 < policy.max_attempts => {
                attempt += 1;
                let delay = policy.backoff_delay(attempt);
                warn!(
                    model = provider.model_name(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "embedding attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbedError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        succeed_on: usize,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn model_name(&self) -> &str {
            "counting"
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.succeed_on {
                Ok(vec![1.0, 0.0])
            } else {
                Err(EmbedError::RateLimited)
            }
        }
    }

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_within_ceiling() {
        let p = CountingProvider {
            calls: AtomicUsize::new(0),
            succeed_on: 3,
        };
        let v = embed_with_retry(&p, "x", &fast_policy(5)).await.unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(p.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_at_ceiling() {
        let p = CountingProvider {
            calls: AtomicUsize::new(0),
            succeed_on: 10,
        };
        let err = embed_with_retry(&p, "x", &fast_policy(3)).await.unwrap_err();
        assert!(matches!(err, EmbedError::RateLimited));
        assert_eq!(p.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_not_retried() {
        struct BadDim;

        #[async_trait::async_trait]
        impl EmbeddingProvider for BadDim {
            fn model_name(&self) -> &str {
                "bad"
            }
            fn dimension(&self) -> usize {
                4
            }
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Err(EmbedError::DimensionMismatch {
                    model: "bad".into(),
                    expected: 4,
                    actual: 3,
                })
            }
        }

        let err = embed_with_retry(&BadDim, "x", &fast_policy(5)).await.unwrap_err();
        assert!(matches!(err, EmbedError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(5), policy.backoff_delay(9));
    }
}
