use crate::shared::error::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Delay schedule between retry attempts.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    None,
    /// `step * attempt`: 2s, 4s, 6s, ...
    Linear { step: Duration },
    /// `base * 2^(attempt-1)`: 1s, 2s, 4s, ...
    Exponential { base: Duration },
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Linear { step } => *step * attempt,
            Backoff::Exponential { base } => *base * 2u32.saturating_pow(attempt.saturating_sub(1)),
        }
    }
}

/// Bounded retry for connectivity-classified failures. Any other error kind
/// aborts immediately: credential rejections and validation failures are
/// authoritative and must not be retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_connectivity() && attempt < self.max_attempts => {
                    let delay = self.backoff.delay(attempt);
                    debug!(attempt, ?delay, "retryable failure: {err}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
