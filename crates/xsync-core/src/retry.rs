//! Bounded retry with linear backoff for control-plane calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Retry policy for one RPC leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1).
    pub attempts: u32,
    /// Backoff grows by this much after every failed attempt.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_step: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff_step: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff_step,
        }
    }

    /// Delay after the `failed`-th failed attempt (1-based): `failed * step`.
    pub fn delay_for(&self, failed: u32) -> Duration {
        self.backoff_step.saturating_mul(failed)
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. Sleeps with `tokio::time::sleep`.
    pub async fn execute<F, Fut, T, E, R>(&self, operation: &str, f: F, retryable: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        R: Fn(&E) -> bool,
    {
        self.execute_with(operation, f, retryable, tokio::time::sleep)
            .await
    }

    /// Like [`execute`](Self::execute) with an injected sleep function.
    ///
    /// No sleep happens after the final attempt.
    pub async fn execute_with<F, Fut, T, E, R, S, SFut>(
        &self,
        operation: &str,
        mut f: F,
        retryable: R,
        mut sleep: S,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        R: Fn(&E) -> bool,
        S: FnMut(Duration) -> SFut,
        SFut: Future<Output = ()>,
    {
        let attempts = self.attempts.max(1);
        let mut failed: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if failed > 0 {
                        debug!(operation, attempt = failed + 1, "succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    failed += 1;
                    if failed >= attempts || !retryable(&error) {
                        return Err(error);
                    }
                    let delay = self.delay_for(failed);
                    debug!(
                        operation,
                        attempt = failed,
                        max_attempts = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
