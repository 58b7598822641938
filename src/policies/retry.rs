//! # Fixed-delay retry policy.
//!
//! [`RetryPolicy`] runs an async operation up to `attempts` times, sleeping
//! `delay` between two attempts. It stops early on success or on an error whose
//! [`Retryable::is_retryable`] is `false`. There is no sleep after the last attempt.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use ticketvisor::RetryPolicy;
//!
//! let policy = RetryPolicy::new(5, Duration::from_millis(800));
//! assert_eq!(policy.attempts, 5);
//! assert_eq!(policy.worst_case_wait(), Duration::from_millis(3200));
//! ```

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;

/// Errors that know whether retrying can help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        ApiError::is_retryable(self)
    }
}

/// Bounded, fixed-delay retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (at least 1).
    pub attempts: u32,
    /// Delay between two attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    /// Five attempts, 800ms apart.
    fn default() -> Self {
        Self::new(5, Duration::from_millis(800))
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Total time spent sleeping when every attempt fails.
    pub fn worst_case_wait(&self) -> Duration {
        self.delay * self.attempts.saturating_sub(1)
    }

    /// Runs `op` (called with the 1-based attempt number) until it succeeds,
    /// fails permanently, or the attempts are used up.
    ///
    /// `on_failure(attempt, &err)` is called after every failed attempt.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut op: F,
        mut on_failure: impl FnMut(u32, &E),
    ) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    on_failure(attempt, &e);
                    if attempt >= self.attempts || !e.is_retryable() {
                        return Err(e);
                    }
                }
            }
            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }
}
