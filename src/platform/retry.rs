//! Retry with capped exponential backoff for transient upstream errors

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps, for tests
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Run `op`, retrying while it fails with a transient error.
///
/// Non-transient errors and the error after the last retry are returned as-is.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retry = 0;
    loop {
        match op().await {
            Err(e) if e.is_transient() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.delay(retry);
                warn!(retry, delay_ms = delay.as_millis(), error = %e, "transient error, retrying");
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, Error};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delays_double_and_cap() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=6).map(|r| policy.delay(r).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_exhausts_after_five_retries() {
        let attempts = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<()> = with_retry(&RetryPolicy::default(), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::from_api(ApiError::with_status(502, "bad gateway", None)))
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 6);
        assert_eq!(result.unwrap_err().status(), Some(502));
        // 1 + 2 + 4 + 8 + 16 seconds of backoff
        assert_eq!(started.elapsed(), Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(&RetryPolicy::default(), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::from_api(ApiError::with_status(500, "boom", None)))
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().status(), Some(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(&RetryPolicy::default(), || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::from_api(ApiError::with_status(502, "bad gateway", None)))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
