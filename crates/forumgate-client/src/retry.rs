//! Rate-limit retry policy.
//!
//! Only HTTP 429 is retried. Each 429 consumes one attempt; while more than
//! one attempt remains the executor sleeps `backoff + wait_seconds` first,
//! where `wait_seconds` comes from the response body.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Retry limits for rate-limited calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of calls issued before giving up
    pub max_attempts: u32,
    /// Fixed delay added to the server's suggested wait
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Never retry: a single attempt.
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Fresh state for one call. A call is always attempted at least once.
    pub fn start(&self) -> RetryState {
        RetryState {
            attempts_remaining: self.max_attempts.max(1),
            backoff: self.backoff,
        }
    }
}

/// Retry bookkeeping for one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempts_remaining: u32,
    backoff: Duration,
}

impl RetryState {
    /// Attempts left, including the next one.
    pub fn attempts_remaining(&self) -> u32 {
        self.attempts_remaining
    }

    /// Whether another call may be issued.
    pub fn can_attempt(&self) -> bool {
        self.attempts_remaining > 0
    }

    /// Record a rate-limited attempt. Returns how long to sleep before the
    /// next one, or `None` when it was the final attempt.
    pub fn rate_limited(&mut self, wait_seconds: f64) -> Option<Duration> {
        let delay = (self.attempts_remaining > 1).then(|| {
            self.backoff
                .saturating_add(Duration::try_from_secs_f64(wait_seconds).unwrap_or_default())
        });
        self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
        delay
    }
}

/// Waits between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync + fmt::Debug {
    /// Pause the current task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
