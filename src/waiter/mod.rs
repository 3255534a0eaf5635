//! Poll a remote resource until it reaches a target status.
//!
//! Lifecycle operations issue a mutating call and then [`wait`] for the
//! resource to converge before reporting success. The waiter stops on the
//! first of:
//!
//! - a status in the spec's `target` set (success)
//! - a status in the `fatal` set ([`WaitError::FatalState`])
//! - a status outside every declared set ([`WaitError::UnexpectedState`])
//! - a non-transient fetch error ([`WaitError::Fetch`])
//! - the deadline ([`WaitError::Timeout`])
//! - cancellation ([`WaitError::Cancelled`])
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use hemmer_provider_waiter::waiter::{wait, Poll, WaitSpec};
//! use hemmer_provider_waiter::ProviderError;
//!
//! # tokio_test::block_on(async {
//! let spec = WaitSpec::builder(Duration::from_secs(5))
//!     .pending(["CREATING"])
//!     .target(["ACTIVE"])
//!     .delays(Duration::from_millis(1), Duration::from_millis(1))
//!     .build()
//!     .unwrap();
//!
//! let fleet = wait(&spec, || async { Ok::<_, ProviderError>(Poll::found("fleet-1", "ACTIVE")) })
//!     .await
//!     .unwrap();
//! assert_eq!(fleet, Some("fleet-1"));
//! # });
//! ```

mod backoff;
mod spec;

pub use backoff::Backoff;
pub use spec::{NotFoundPolicy, Poll, WaitSpec, WaitSpecBuilder, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY};

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, WaitError, WaitFailure};

/// Fetches the current status of a remote resource.
///
/// Implemented for any `FnMut() -> impl Future<Output = Result<Poll<T>, ProviderError>>`,
/// so most callers pass a closure over their API client and identifier.
pub trait StatusFetcher<T>: Send {
    /// Fetch the resource and its current status.
    fn fetch(&mut self) -> impl Future<Output = Result<Poll<T>, ProviderError>> + Send;
}

impl<T, F, Fut> StatusFetcher<T> for F
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Poll<T>, ProviderError>> + Send,
{
    fn fetch(&mut self) -> impl Future<Output = Result<Poll<T>, ProviderError>> + Send {
        (self)()
    }
}

/// Wait for the resource behind `fetch` to reach a target status.
///
/// Returns the resource from the poll that satisfied the target, or `None`
/// when the target was reached through a [`NotFoundPolicy::Sentinel`].
pub async fn wait<T, F>(spec: &WaitSpec, fetch: F) -> Result<Option<T>, WaitFailure<T>>
where
    T: Debug + Send,
    F: StatusFetcher<T>,
{
    wait_with_cancel(spec, &CancellationToken::new(), fetch).await
}

/// Like [`wait`], for waits whose target is only reachable while the resource exists.
///
/// A target reached through absence is reported as [`WaitError::NotFound`]
/// with the number of consecutive polls that found nothing.
pub async fn wait_found<T, F>(spec: &WaitSpec, fetch: F) -> Result<T, WaitFailure<T>>
where
    T: Debug + Send,
    F: StatusFetcher<T>,
{
    let reached = poll_until_target(spec, &CancellationToken::new(), fetch).await?;
    reached.resource.ok_or_else(|| {
        WaitFailure::new(WaitError::NotFound {
            checks: reached.not_found_checks,
        })
    })
}

/// Like [`wait`], but stops with [`WaitError::Cancelled`] once `cancel` fires.
///
/// The token is checked before every poll and interrupts every sleep and
/// every in-flight fetch.
pub async fn wait_with_cancel<T, F>(
    spec: &WaitSpec,
    cancel: &CancellationToken,
    fetch: F,
) -> Result<Option<T>, WaitFailure<T>>
where
    T: Debug + Send,
    F: StatusFetcher<T>,
{
    poll_until_target(spec, cancel, fetch)
        .await
        .map(|reached| reached.resource)
}

/// A successful wait.
struct Reached<T> {
    resource: Option<T>,
    /// Consecutive absent polls leading up to the target.
    not_found_checks: u32,
}

async fn poll_until_target<T, F>(
    spec: &WaitSpec,
    cancel: &CancellationToken,
    mut fetch: F,
) -> Result<Reached<T>, WaitFailure<T>>
where
    T: Debug + Send,
    F: StatusFetcher<T>,
{
    let start = Instant::now();
    let deadline = start + spec.timeout();
    let mut backoff = Backoff::new(spec.min_delay(), spec.max_delay());
    let mut state = PollState::default();

    if !spec.initial_delay().is_zero() && !sleep_or_cancel(spec.initial_delay(), cancel).await {
        return Err(state.fail(WaitError::Cancelled { last_status: None }));
    }

    loop {
        if cancel.is_cancelled() {
            let last_status = state.last_status.clone();
            return Err(state.fail(WaitError::Cancelled { last_status }));
        }

        state.attempts += 1;
        // A hung API call must not hold the wait past its deadline.
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let last_status = state.last_status.clone();
                return Err(state.fail(WaitError::Cancelled { last_status }));
            },
            fetched = fetch.fetch() => fetched,
            _ = tokio::time::sleep_until(deadline) => {
                warn!(attempt = state.attempts, "status fetch still running at deadline");
                let error = WaitError::Timeout {
                    last_status: state.last_status.clone(),
                    elapsed: start.elapsed(),
                    timeout: spec.timeout(),
                };
                return Err(state.fail(error));
            },
        };

        match fetched {
            Err(err) if err.is_retryable() => {
                warn!(attempt = state.attempts, error = %err, "transient error fetching status, retrying");
            },
            Err(err) => return Err(state.fail(err.into())),
            Ok(poll) => {
                if let Some(outcome) = observe(spec, &mut state, poll) {
                    return outcome.map(|resource| {
                        info!(
                            attempts = state.attempts,
                            elapsed = ?start.elapsed(),
                            "resource reached target state"
                        );
                        Reached {
                            resource,
                            not_found_checks: state.not_found_checks,
                        }
                    });
                }
            },
        }

        let now = Instant::now();
        if now >= deadline {
            let error = WaitError::Timeout {
                last_status: state.last_status.clone(),
                elapsed: now - start,
                timeout: spec.timeout(),
            };
            return Err(state.fail(error));
        }

        let delay = backoff.next_delay_within(deadline - now);
        if !sleep_or_cancel(delay, cancel).await {
            let last_status = state.last_status.clone();
            return Err(state.fail(WaitError::Cancelled { last_status }));
        }
    }
}

/// Loop-local bookkeeping for one wait.
struct PollState<T> {
    attempts: u32,
    not_found_checks: u32,
    target_hits: u32,
    last_status: Option<String>,
    last_resource: Option<T>,
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self {
            attempts: 0,
            not_found_checks: 0,
            target_hits: 0,
            last_status: None,
            last_resource: None,
        }
    }
}

impl<T: Debug> PollState<T> {
    fn fail(self, error: WaitError) -> WaitFailure<T> {
        WaitFailure {
            error,
            resource: self.last_resource,
        }
    }
}

/// Classify one poll. `None` means keep polling.
fn observe<T: Debug>(
    spec: &WaitSpec,
    state: &mut PollState<T>,
    poll: Poll<T>,
) -> Option<Result<Option<T>, WaitFailure<T>>> {
    let Poll {
        resource,
        status,
        reason,
    } = poll;

    let status = match resource {
        Some(resource) => {
            state.not_found_checks = 0;
            state.last_resource = Some(resource);
            status
        },
        None => {
            state.not_found_checks += 1;
            state.last_resource = None;
            match spec.not_found() {
                NotFoundPolicy::Sentinel(sentinel) => sentinel.clone(),
                NotFoundPolicy::Retry => {
                    debug!(attempt = state.attempts, "resource not found, retrying");
                    state.target_hits = 0;
                    return None;
                },
                NotFoundPolicy::RetryAtMost(limit) if state.not_found_checks < *limit => {
                    debug!(
                        attempt = state.attempts,
                        checks = state.not_found_checks,
                        "resource not found, retrying"
                    );
                    state.target_hits = 0;
                    return None;
                },
                NotFoundPolicy::RetryAtMost(_) | NotFoundPolicy::Fail => {
                    let checks = state.not_found_checks;
                    return Some(Err(take_failure(state, WaitError::NotFound { checks })));
                },
            }
        },
    };

    debug!(attempt = state.attempts, status = %status, "polled resource status");
    state.last_status = Some(status.clone());

    if spec.target().contains(&status) {
        state.target_hits += 1;
        if state.target_hits >= spec.continuous_target_occurrence() {
            return Some(Ok(state.last_resource.take()));
        }
        return None;
    }

    state.target_hits = 0;

    if spec.fatal().contains(&status) {
        return Some(Err(take_failure(
            state,
            WaitError::FatalState { status, reason },
        )));
    }

    if spec.pending().contains(&status) {
        return None;
    }

    Some(Err(take_failure(
        state,
        WaitError::UnexpectedState {
            status,
            expected: spec.expected(),
        },
    )))
}

fn take_failure<T: Debug>(state: &mut PollState<T>, error: WaitError) -> WaitFailure<T> {
    WaitFailure {
        error,
        resource: state.last_resource.take(),
    }
}

/// Sleep for `delay`; `false` if `cancel` fired first.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        assert_fatal_state, assert_timeout, assert_unexpected_state, CallCounter, ScriptedFetcher,
    };

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn creating_spec() -> WaitSpec {
        WaitSpec::builder(Duration::from_secs(60))
            .pending(["CREATING"])
            .target(["ACTIVE"])
            .fatal(["FAILED"])
            .delays(ms(10), ms(100))
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaches_target_after_three_polls() {
        let spec = WaitSpec::builder(Duration::from_secs(60))
            .pending(["CREATING"])
            .target(["ACTIVE"])
            .delays(ms(10), ms(10))
            .build()
            .unwrap();
        let fetcher = ScriptedFetcher::new(vec![
            Ok(Poll::found(1, "CREATING")),
            Ok(Poll::found(2, "CREATING")),
            Ok(Poll::found(3, "ACTIVE")),
        ]);
        let calls = fetcher.calls();

        let resource = wait(&spec, fetcher).await.unwrap();

        assert_eq!(resource, Some(3));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_target_resource() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(Poll::found("creating", "CREATING")),
            Ok(Poll::found("first-active", "ACTIVE")),
            Ok(Poll::found("second-active", "ACTIVE")),
        ]);
        let calls = fetcher.calls();

        let resource = wait(&creating_spec(), fetcher).await.unwrap();

        assert_eq!(resource, Some("first-active"));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_accepted_as_target() {
        let spec = WaitSpec::builder(Duration::from_secs(60))
            .pending(["SHARING"])
            .target(["SHARED", "SHARE_FAILED"])
            .delays(ms(10), ms(10))
            .build()
            .unwrap();
        let fetcher = ScriptedFetcher::new(vec![
            Ok(Poll::found("share", "SHARING")),
            Ok(Poll::found("share", "SHARE_FAILED")),
        ]);

        let resource = wait(&spec, fetcher).await.unwrap();
        assert_eq!(resource, Some("share"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_status_stops_polling() {
        let spec = WaitSpec::builder(Duration::from_secs(60))
            .pending(["SHARING"])
            .target(["SHARED"])
            .fatal(["SHARE_FAILED"])
            .delays(ms(10), ms(10))
            .build()
            .unwrap();
        let fetcher = ScriptedFetcher::new(vec![
            Ok(Poll::found("share", "SHARING")),
            Ok(Poll::found("share", "SHARE_FAILED").with_reason("account closed")),
            Ok(Poll::found("share", "SHARED")),
        ]);
        let calls = fetcher.calls();

        let failure = wait(&spec, fetcher).await.unwrap_err();

        assert_fatal_state(&failure.error, "SHARE_FAILED");
        assert!(matches!(
            failure.error,
            WaitError::FatalState { reason: Some(ref r), .. } if r == "account closed"
        ));
        assert_eq!(failure.resource, Some("share"));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_status_fails_without_waiting() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(Poll::found(1, "CREATING")),
            Ok(Poll::found(1, "MIGRATING")),
        ]);
        let calls = fetcher.calls();
        let start = Instant::now();

        let failure = wait(&creating_spec(), fetcher).await.unwrap_err();

        assert_unexpected_state(&failure.error, "MIGRATING");
        assert_eq!(calls.get(), 2);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_with_fixed_interval() {
        let spec = WaitSpec::builder(ms(100))
            .pending(["PENDING"])
            .target(["DONE"])
            .delays(ms(10), ms(10))
            .build()
            .unwrap();
        let fetcher = ScriptedFetcher::repeating(Poll::found((), "PENDING"));
        let start = Instant::now();

        let failure = wait(&spec, fetcher).await.unwrap_err();
        let elapsed = start.elapsed();

        assert_timeout(&failure.error);
        assert!(elapsed >= ms(100), "returned early: {:?}", elapsed);
        assert!(elapsed <= ms(110), "returned late: {:?}", elapsed);
        assert!(matches!(
            failure.error,
            WaitError::Timeout { last_status: Some(ref s), .. } if s == "PENDING"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bounded_by_max_delay() {
        let spec = WaitSpec::builder(Duration::from_secs(3))
            .pending(["PENDING"])
            .target(["DONE"])
            .delays(ms(500), Duration::from_secs(2))
            .build()
            .unwrap();
        let start = Instant::now();

        let failure = wait(&spec, ScriptedFetcher::repeating(Poll::found((), "PENDING")))
            .await
            .unwrap_err();
        let elapsed = start.elapsed();

        assert_timeout(&failure.error);
        assert!(elapsed >= spec.timeout());
        assert!(elapsed <= spec.timeout() + spec.max_delay());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_stops_at_deadline() {
        let spec = WaitSpec::builder(ms(100))
            .pending(["PENDING"])
            .target(["DONE"])
            .delays(ms(10), ms(10))
            .build()
            .unwrap();
        let calls = CallCounter::default();
        let counter = calls.clone();
        let start = Instant::now();

        let failure = wait(&spec, move || {
            counter.increment();
            let attempt = counter.get();
            async move {
                if attempt > 1 {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                Ok::<_, ProviderError>(Poll::found(attempt, "PENDING"))
            }
        })
        .await
        .unwrap_err();
        let elapsed = start.elapsed();

        assert_timeout(&failure.error);
        assert!(elapsed <= spec.timeout() + spec.max_delay(), "returned late: {:?}", elapsed);
        assert_eq!(failure.error.last_status(), Some("PENDING"));
        assert_eq!(failure.resource, Some(1));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_hung_fetch() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });
        let start = Instant::now();

        let failure = wait_with_cancel(&creating_spec(), &cancel, || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, ProviderError>(Poll::found((), "ACTIVE"))
        })
        .await
        .unwrap_err();

        assert!(failure.error.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_fetch_error_propagates() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(Poll::found(1, "CREATING")),
            Err(ProviderError::PermissionDenied("AccessDenied".to_string())),
            Ok(Poll::found(1, "ACTIVE")),
        ]);
        let calls = fetcher.calls();

        let failure = wait(&creating_spec(), fetcher).await.unwrap_err();

        assert!(matches!(failure.error, WaitError::Fetch(_)));
        assert_eq!(failure.resource, Some(1));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_fetch_error_keeps_polling() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(ProviderError::ResourceExhausted("Throttling".to_string())),
            Err(ProviderError::Unavailable("ServiceUnavailable".to_string())),
            Ok(Poll::found(1, "ACTIVE")),
        ]);
        let calls = fetcher.calls();

        let resource = wait(&creating_spec(), fetcher).await.unwrap();

        assert_eq!(resource, Some(1));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_resource_retried_by_default() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(Poll::gone()),
            Ok(Poll::gone()),
            Ok(Poll::found(5, "ACTIVE")),
        ]);

        let resource = wait(&creating_spec(), fetcher).await.unwrap();
        assert_eq!(resource, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_resource_as_sentinel_target() {
        let spec = WaitSpec::builder(Duration::from_secs(60))
            .pending(["DELETING"])
            .target(["DELETED"])
            .not_found(NotFoundPolicy::Sentinel("DELETED".to_string()))
            .delays(ms(10), ms(10))
            .build()
            .unwrap();
        let fetcher = ScriptedFetcher::new(vec![Ok(Poll::found(1, "DELETING")), Ok(Poll::gone())]);

        let resource = wait(&spec, fetcher).await.unwrap();
        assert_eq!(resource, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_found_reports_absent_checks() {
        let spec = WaitSpec::builder(Duration::from_secs(60))
            .pending(["DELETING"])
            .target(["DELETED"])
            .not_found(NotFoundPolicy::Sentinel("DELETED".to_string()))
            .continuous_target_occurrence(2)
            .delays(ms(10), ms(10))
            .build()
            .unwrap();
        let fetcher = ScriptedFetcher::new(vec![
            Ok(Poll::found(1, "DELETING")),
            Ok(Poll::gone()),
            Ok(Poll::gone()),
        ]);

        let failure = wait_found(&spec, fetcher).await.unwrap_err();
        assert!(matches!(failure.error, WaitError::NotFound { checks: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_resource_fails_immediately() {
        let spec = WaitSpec::builder(Duration::from_secs(60))
            .target(["ACTIVE"])
            .not_found(NotFoundPolicy::Fail)
            .build()
            .unwrap();

        let failure = wait(&spec, ScriptedFetcher::new(vec![Ok(Poll::<()>::gone())]))
            .await
            .unwrap_err();
        assert!(matches!(failure.error, WaitError::NotFound { checks: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_resource_check_limit() {
        let spec = WaitSpec::builder(Duration::from_secs(60))
            .pending(["CREATING"])
            .target(["ACTIVE"])
            .not_found(NotFoundPolicy::RetryAtMost(3))
            .delays(ms(10), ms(10))
            .build()
            .unwrap();
        let fetcher = ScriptedFetcher::repeating(Poll::<()>::gone());
        let calls = fetcher.calls();

        let failure = wait(&spec, fetcher).await.unwrap_err();

        assert!(matches!(failure.error, WaitError::NotFound { checks: 3 }));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_limit_counts_consecutive_absences() {
        let spec = WaitSpec::builder(Duration::from_secs(60))
            .pending(["CREATING"])
            .target(["ACTIVE"])
            .not_found(NotFoundPolicy::RetryAtMost(2))
            .delays(ms(10), ms(10))
            .build()
            .unwrap();
        let fetcher = ScriptedFetcher::new(vec![
            Ok(Poll::gone()),
            Ok(Poll::found(1, "CREATING")),
            Ok(Poll::gone()),
            Ok(Poll::found(1, "ACTIVE")),
        ]);

        assert_eq!(wait(&spec, fetcher).await.unwrap(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_target_occurrence() {
        let spec = WaitSpec::builder(Duration::from_secs(60))
            .pending(["PENDING"])
            .target(["INSYNC"])
            .continuous_target_occurrence(2)
            .delays(ms(10), ms(10))
            .build()
            .unwrap();
        let fetcher = ScriptedFetcher::new(vec![
            Ok(Poll::found(1, "INSYNC")),
            Ok(Poll::found(2, "PENDING")),
            Ok(Poll::found(3, "INSYNC")),
            Ok(Poll::found(4, "INSYNC")),
        ]);
        let calls = fetcher.calls();

        assert_eq!(wait(&spec, fetcher).await.unwrap(), Some(4));
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delay_before_first_poll() {
        let spec = WaitSpec::builder(Duration::from_secs(60))
            .target(["ACTIVE"])
            .initial_delay(Duration::from_secs(5))
            .build()
            .unwrap();
        let start = Instant::now();

        wait(&spec, ScriptedFetcher::new(vec![Ok(Poll::found((), "ACTIVE"))]))
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_poll() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let fetcher = ScriptedFetcher::repeating(Poll::found((), "CREATING"));
        let calls = fetcher.calls();

        let failure = wait_with_cancel(&creating_spec(), &cancel, fetcher)
            .await
            .unwrap_err();

        assert!(failure.error.is_cancelled());
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_while_sleeping() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            trigger.cancel();
        });
        let start = Instant::now();

        let failure = wait_with_cancel(
            &creating_spec(),
            &cancel,
            ScriptedFetcher::repeating(Poll::found((), "CREATING")),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            failure.error,
            WaitError::Cancelled { last_status: Some(ref s) } if s == "CREATING"
        ));
        assert!(start.elapsed() < spec_timeout());
    }

    fn spec_timeout() -> Duration {
        creating_spec().timeout()
    }

    #[tokio::test(start_paused = true)]
    async fn test_closure_fetcher() {
        let mut polls = vec!["ACTIVE", "CREATING"];
        let resource = wait(&creating_spec(), move || {
            let status = polls.pop().unwrap_or("ACTIVE");
            async move { Ok::<_, ProviderError>(Poll::found(status.len(), status)) }
        })
        .await
        .unwrap();

        assert_eq!(resource, Some("ACTIVE".len()));
    }
}
