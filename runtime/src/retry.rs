//! Retry logic with exponential backoff for transient failures.
//!
//! Checkout network calls (registration, order creation, document upload)
//! are retried a small, bounded number of times. Only errors the caller
//! classifies as transient are retried; a rejected request (4xx) fails
//! immediately.
//!
//! # Example
//!
//! ```rust
//! use festival_runtime::retry::{RetryPolicy, retry_with_predicate};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .initial_delay(Duration::from_millis(300))
//!     .build();
//!
//! let order = retry_with_predicate(
//!     &policy,
//!     || async { Ok::<_, String>("order-1") },
//!     |err: &String| err.contains("timeout"),
//! )
//! .await
//! .map_err(|failure| failure.error)?;
//! # assert_eq!(order, "order-1");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration for exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3 (the first call plus two retries)
/// - `initial_delay`: 300ms
/// - `max_delay`: 5 seconds
/// - `multiplier`: 2.0
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries (cap for exponential backoff)
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: Self::default(),
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `delay = initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);

        if !delay_ms.is_finite() || delay_ms >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }
        Duration::from_millis(delay_ms as u64)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Set the total number of attempts (at least 1).
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.policy.max_attempts = attempts.max(1);
        self
    }

    /// Set delay before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    /// Set maximum delay (cap for exponential backoff).
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    /// Set multiplier for exponential backoff.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// The last error of a retried operation and how many attempts were made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure<E> {
    /// Error from the final attempt
    pub error: E,
    /// Attempts made, including the first one
    pub attempts: u32,
}

/// Retry an async operation while `is_retryable` says the error is transient.
///
/// # Errors
///
/// Returns a [`RetryFailure`] carrying the last error when the error is not
/// retryable or the attempts are exhausted.
pub async fn retry_with_predicate<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            },
            Err(error) => {
                if !is_retryable(&error) {
                    tracing::warn!(attempt, error = %error, "Error is not retryable, failing immediately");
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                    });
                }

                if attempt >= policy.max_attempts {
                    tracing::error!(attempt, error = %error, "Operation failed after max attempts");
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                    });
                }

                let delay = policy.delay_after_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "Operation failed, retrying..."
                );

                sleep(delay).await;
                attempt += 1;
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn delays_double_until_capped() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(300))
            .multiplier(2.0)
            .max_delay(Duration::from_secs(1))
            .build();

        assert_eq!(policy.delay_after_attempt(1), Duration::from_millis(300));
        assert_eq!(policy.delay_after_attempt(2), Duration::from_millis(600));
        assert_eq!(policy.delay_after_attempt(3), Duration::from_secs(1));
        assert_eq!(policy.delay_after_attempt(40), Duration::from_secs(1));
    }

    #[test]
    fn max_attempts_is_at_least_one() {
        assert_eq!(RetryPolicy::builder().max_attempts(0).build().max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result = retry_with_predicate(
            &RetryPolicy::default(),
            || {
                let c = Arc::clone(&counter);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("timeout".to_string())
                    } else {
                        Ok(7)
                    }
                }
            },
            |e: &String| e == "timeout",
        )
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_bounded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let failure = retry_with_predicate(
            &RetryPolicy::default(),
            || {
                let c = Arc::clone(&counter);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("503")
                }
            },
            |_| true,
        )
        .await
        .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_errors_fail_on_first_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let failure = retry_with_predicate(
            &RetryPolicy::default(),
            || {
                let c = Arc::clone(&counter);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("400 bad request")
                }
            },
            |e: &&str| !e.starts_with('4'),
        )
        .await
        .unwrap_err();

        assert_eq!(failure, RetryFailure { error: "400 bad request", attempts: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
