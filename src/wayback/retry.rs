//! Retry policy for snapshot downloads.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::error::{Error, Result};

/// Exponential backoff policy.
///
/// The wait after attempt `n` (1-based) is `multiplier * 2^(n-1)`, clamped to
/// `[min_wait, max_wait]`. Only errors for which [`Error::is_retryable`] holds
/// are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            multiplier: Duration::from_secs(1),
            min_wait: Duration::from_secs(32),
            max_wait: Duration::from_secs(64),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            multiplier: Duration::ZERO,
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
        }
    }

    /// Wait before the attempt following `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2_u32.saturating_pow(exponent);
        self.multiplier
            .saturating_mul(factor)
            .min(self.max_wait)
            .max(self.min_wait)
    }

    /// Whether another attempt is allowed after `attempt` failed with `error`.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &Error) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned on exhaustion.
    ///
    /// # Errors
    ///
    /// Propagates the error of the final attempt.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(attempt, &e) => {
                    let wait = self.delay_after(attempt);
                    warn!(
                        op = %label,
                        attempt,
                        max_attempts = self.max_attempts,
                        wait_secs = wait.as_secs_f64(),
                        error = %e,
                        "Request failed, retrying"
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(op = %label, attempts = attempt, error = %e, "Retry budget exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}
