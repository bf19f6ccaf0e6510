//! Retry operator for the startup connect-and-verify sequence.
//!
//! The factory body is retried as a unit: only retryable errors
//! (connectivity, timeout) re-enter the loop, with a fixed delay between
//! attempts. Exceeding the attempt budget surfaces the last error.

use crate::error::{DbError, DbResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Retry policy: attempt budget and fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with a fixed delay.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            // A zero budget would skip the operation entirely.
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Execute an async operation with retry logic.
pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, mut operation: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if !error.is_retryable() || attempt == policy.max_attempts {
                    return Err(error);
                }

                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %error,
                    "Retrying after failure"
                );

                last_error = Some(error);
                sleep(policy.delay).await;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| DbError::internal("Retry failed with no error")))
}
