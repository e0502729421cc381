use std::thread;
use std::time::Duration;

use dqa_core::config::RetryConfig;
use dqa_core::error::AppError;
use tracing::warn;

/// Bounded retry for transient failures. Only errors flagged `retryable` are retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T, AppError>
    where
        F: FnMut() -> Result<T, AppError>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if e.retryable && attempt < max => {
                    let delay = self.backoff.saturating_mul(1u32 << (attempt - 1).min(16));
                    warn!(what, attempt, max, err = %e, "transient failure; retrying");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(c: RetryConfig) -> Self {
        Self {
            max_attempts: c.max_attempts,
            backoff: Duration::from_millis(c.backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}
