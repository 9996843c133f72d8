//! Bounded retries with optional exponential backoff.
//!
//! [`RetryExecutor::execute`] runs an async operation until it succeeds or
//! the [`RetryPolicy`] gives up. Before retry `n` (counting from 1) it sleeps
//! `interval * 2^(n-1)` with exponential backoff, or `interval` otherwise.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use lc_sync::retry::{DefaultRetryPolicy, RetryExecutor};
//!
//! let executor = RetryExecutor::new(Duration::from_millis(100), true);
//! assert_eq!(executor.delay_for(1), Duration::from_millis(100));
//! assert_eq!(executor.delay_for(3), Duration::from_millis(400));
//!
//! let policy = DefaultRetryPolicy::new(3);
//! assert_eq!(policy.max_attempts(), 4);
//! ```

use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use lc_core::RetryConfig;

use crate::error::Retryable;

/// Decides whether a failed attempt is retried.
pub trait RetryPolicy<E> {
    /// `attempt` is the zero-based index of the attempt that just failed.
    fn should_retry(&self, err: &E, attempt: u32) -> bool;
}

/// Retries retryable errors up to `max_retries` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultRetryPolicy {
    max_retries: u32,
}

impl DefaultRetryPolicy {
    /// Creates a policy allowing `max_retries` retries after the first
    /// attempt.
    #[must_use]
    pub const fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Creates a policy from configuration.
    #[must_use]
    pub const fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries)
    }

    /// Total number of attempts, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl<E: Retryable> RetryPolicy<E> for DefaultRetryPolicy {
    fn should_retry(&self, err: &E, attempt: u32) -> bool {
        attempt < self.max_retries && err.is_retryable()
    }
}

/// An operation that failed on every attempt.
#[derive(Debug, thiserror::Error)]
#[error("failed after {attempts} attempt(s): {source}")]
pub struct RetryError<E: StdError + 'static> {
    /// How many attempts were made.
    pub attempts: u32,
    /// The error of the last attempt.
    #[source]
    pub source: E,
}

impl<E: StdError + 'static> RetryError<E> {
    /// Returns the error of the last attempt.
    pub fn into_inner(self) -> E {
        self.source
    }
}

/// Runs operations with retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryExecutor {
    interval: Duration,
    exponential: bool,
}

impl RetryExecutor {
    /// Creates an executor with the given base interval.
    #[must_use]
    pub const fn new(interval: Duration, exponential: bool) -> Self {
        Self {
            interval,
            exponential,
        }
    }

    /// Creates an executor from configuration.
    #[must_use]
    pub const fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.retry_interval(), config.exponential_backoff)
    }

    /// Sleep before retry `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        if !self.exponential || retry <= 1 {
            return self.interval;
        }
        let factor = 1_u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
        self.interval.saturating_mul(factor)
    }

    /// Runs `op` until it succeeds or `policy` stops retrying.
    pub async fn execute<T, E, P, F, Fut>(&self, policy: &P, mut op: F) -> Result<T, RetryError<E>>
    where
        E: StdError + 'static,
        P: RetryPolicy<E>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0_u32;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(attempts = attempt + 1, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !policy.should_retry(&err, attempt) {
                        return Err(RetryError {
                            attempts: attempt + 1,
                            source: err,
                        });
                    }
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    tracing::debug!(
                        retry = attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
