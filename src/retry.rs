//! Retry eventually-consistent API calls.
//!
//! Mutating calls often fail for a short while after a dependency was
//! created (a directory that is not yet visible, an IAM role that has not
//! propagated). [`retry`] repeats such a call with backoff until it stops
//! failing retryably, and makes one final attempt once the timeout elapses.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::waiter::Backoff;

/// How an attempt failed.
#[derive(Debug)]
pub enum RetryError {
    /// The call may succeed if repeated.
    Retryable(ProviderError),
    /// The call will not succeed; stop retrying.
    NonRetryable(ProviderError),
}

impl RetryError {
    /// Classify `err` as retryable when `retryable` accepts it.
    pub fn classify(err: ProviderError, retryable: impl FnOnce(&ProviderError) -> bool) -> Self {
        if retryable(&err) {
            Self::Retryable(err)
        } else {
            Self::NonRetryable(err)
        }
    }

    /// Retryable when the error carries the given service code.
    pub fn on_code(err: ProviderError, code: &str) -> Self {
        Self::classify(err, |e| e.is_code(code))
    }

    /// The underlying error.
    pub fn into_inner(self) -> ProviderError {
        match self {
            Self::Retryable(err) | Self::NonRetryable(err) => err,
        }
    }
}

/// Timing for [`retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Time after which only one final attempt is made.
    pub timeout: Duration,
    /// First backoff interval.
    pub min_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Default backoff (500ms doubling to 10s) with the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Override the backoff bounds.
    pub fn with_delays(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max;
        self
    }
}

/// Run `op` until it succeeds, fails non-retryably, or the timeout elapses.
///
/// After the timeout one more attempt is made and its outcome returned,
/// whatever the classification of its error.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut backoff = Backoff::new(policy.min_delay, policy.max_delay);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(err)) => return Err(err),
            Err(RetryError::Retryable(err)) => {
                let now = Instant::now();
                if now >= deadline {
                    warn!(attempt, error = %err, "retry timeout elapsed, making final attempt");
                    return op().await.map_err(RetryError::into_inner);
                }
                let delay = backoff.next_delay_within(deadline - now);
                debug!(attempt, error = %err, delay = ?delay, "retryable error, backing off");
                tokio::time::sleep(delay).await;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CallCounter;

    const NOT_VISIBLE: &str = "DirectoryDoesNotExistException";

    fn policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(10))
            .with_delays(Duration::from_millis(100), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let result = retry(policy(), || async { Ok::<_, RetryError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventual_success() {
        let calls = CallCounter::default();
        let counter = calls.clone();

        let result = retry(policy(), || {
            counter.increment();
            let attempt = counter.get();
            async move {
                if attempt < 3 {
                    Err(RetryError::on_code(
                        ProviderError::api(NOT_VISIBLE, "not yet"),
                        NOT_VISIBLE,
                    ))
                } else {
                    Ok("shared")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "shared");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_returns_immediately() {
        let calls = CallCounter::default();
        let counter = calls.clone();

        let result: Result<(), _> = retry(policy(), || {
            counter.increment();
            async {
                Err(RetryError::on_code(
                    ProviderError::api("AccessDeniedException", "denied"),
                    NOT_VISIBLE,
                ))
            }
        })
        .await;

        assert!(result.unwrap_err().is_code("AccessDeniedException"));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_attempt_after_timeout() {
        let calls = CallCounter::default();
        let counter = calls.clone();
        let start = Instant::now();

        let result: Result<(), _> = retry(policy(), || {
            counter.increment();
            async { Err(RetryError::Retryable(ProviderError::api(NOT_VISIBLE, "gone"))) }
        })
        .await;

        assert!(result.unwrap_err().is_code(NOT_VISIBLE));
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() <= Duration::from_secs(11));
        // 100ms, 200ms, 400ms, 800ms, then 1s steps up to 10s, plus the final attempt.
        assert!(calls.get() > 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_attempt_can_succeed() {
        let calls = CallCounter::default();
        let counter = calls.clone();
        let policy = RetryPolicy::new(Duration::from_millis(300))
            .with_delays(Duration::from_millis(100), Duration::from_millis(100));

        let result = retry(policy, || {
            counter.increment();
            let attempt = counter.get();
            async move {
                // Attempts at 0, 100, 200 and 300ms fail; the final one succeeds.
                if attempt <= 4 {
                    Err(RetryError::Retryable(ProviderError::Unavailable("busy".to_string())))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 5);
    }

    #[test]
    fn test_classify() {
        let err = RetryError::classify(ProviderError::Unavailable("x".to_string()), |e| {
            e.is_retryable()
        });
        assert!(matches!(err, RetryError::Retryable(_)));

        let err = RetryError::classify(ProviderError::NotFound("x".to_string()), |e| {
            e.is_retryable()
        });
        assert!(matches!(err, RetryError::NonRetryable(_)));
        assert!(err.into_inner().is_not_found());
    }
}
