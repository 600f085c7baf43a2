//! Bounded retry for remote index calls.
//!
//! A [`RetryPolicy`] runs an async operation up to `max_attempts` times,
//! sleeping a fixed delay between attempts. Only transient
//! [`IndexError`]s are retried; a permanent error ends the loop at once.
//! Exhaustion is returned as a value ([`RetryExhausted`]) so the caller can
//! record it and carry on with independent work.

use std::future::Future;
use std::time::Duration;

use crate::error::IndexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// The last error seen after a retried operation gave up.
#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: IndexError,
}

impl std::fmt::Display for RetryExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed after {} attempt(s): {}",
            self.attempts, self.last_error
        )
    }
}

impl RetryPolicy {
    /// `max_attempts` below 1 is raised to 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `label` names the operation in log output.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            tracing::debug!(operation = label, attempt, "calling search index");

            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                tracing::error!(operation = label, attempt, error = %err, "permanent failure, not retrying");
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }

            if attempt >= self.max_attempts {
                tracing::error!(
                    operation = label,
                    attempts = attempt,
                    error = %err,
                    "giving up"
                );
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }

            tracing::warn!(
                operation = label,
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = self.delay.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );
            tokio::time::sleep(self.delay).await;
        }
    }
}
