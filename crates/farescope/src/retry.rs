//! Bounded exponential backoff for individual workflow steps.

use crate::types::ScrapeResult;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier: 2.0,
        }
    }

    /// Delay before retry `attempt` (1-based: attempt 1 waits base_delay).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        self.base_delay.mul_f64(factor)
    }

    /// Run `op`, retrying on error up to `max_attempts` total attempts with
    /// exponential backoff between them. Returns the last error unchanged.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> ScrapeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ScrapeResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::debug!(label, attempt, error = %e, "step attempt failed");
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.delay_for(attempt)).await;
                    }
                }
            }
        }
        // attempts >= 1, so at least one error was recorded.
        Err(last_err.unwrap_or_else(|| unreachable!()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScrapeError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = policy
            .run("flaky", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(ScrapeError::Browser("transient".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result: ScrapeResult<()> = policy
            .run("doomed", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(ScrapeError::Browser(format!("failure {n}"))) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("failure 2"), "got: {err}");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
