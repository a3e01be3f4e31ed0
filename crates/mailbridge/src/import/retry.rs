//! Bounded exponential backoff around destination calls.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::rate::RateLimiter;
use crate::destination::DestinationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: Duration,
    max: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; it is clamped to at least one.
    pub fn new(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            max: max.max(base),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause after the `attempt`-th failure (1-based): `base * 2^(attempt-1)`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Like [`RetryPolicy::delay_for`] but never shorter than a server hint.
    pub fn delay_with_hint(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let delay = self.delay_for(attempt);
        match hint {
            Some(hint) => delay.max(hint),
            None => delay,
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. Every attempt waits on `limiter` first.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    limiter: Option<&RateLimiter>,
    what: &str,
    mut op: F,
) -> Result<T, DestinationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DestinationError>>,
{
    let mut attempt = 1;
    loop {
        if let Some(limiter) = limiter {
            limiter.acquire().await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts() => {
                let delay = policy.delay_with_hint(attempt, e.retry_after());
                debug!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    what,
                    attempt,
                    policy.max_attempts(),
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!("{} gave up after {} attempts: {}", what, attempt, e);
                }
                return Err(e);
            }
        }
    }
}
