//! Testing utilities for waiters and lifecycle operations.
//!
//! This module provides scripted status fetchers and assertion helpers so
//! waits can be exercised without a remote API.
//!
//! # Example
//!
//! ```ignore
//! use hemmer_provider_waiter::testing::ScriptedFetcher;
//! use hemmer_provider_waiter::waiter::{wait, Poll};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_becomes_active() {
//!     let fetcher = ScriptedFetcher::new(vec![
//!         Ok(Poll::found("fleet", "STARTING")),
//!         Ok(Poll::found("fleet", "RUNNING")),
//!     ]);
//!     let calls = fetcher.calls();
//!
//!     wait(&spec, fetcher).await.unwrap();
//!     assert_eq!(calls.get(), 2);
//! }
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{ProviderError, WaitError};
use crate::waiter::{Poll, StatusFetcher};

/// Shared count of fetcher invocations.
///
/// Cloned out of a [`ScriptedFetcher`] before the fetcher is moved into a wait.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    /// Record one call.
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of calls so far.
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

enum Script<T> {
    Sequence(VecDeque<Result<Poll<T>, ProviderError>>),
    Repeat(Poll<T>),
}

/// A [`StatusFetcher`] that replays a fixed script of poll outcomes.
///
/// Once a sequence is exhausted every further fetch returns a
/// non-retryable error, which ends the wait.
pub struct ScriptedFetcher<T> {
    script: Script<T>,
    calls: CallCounter,
}

impl<T> ScriptedFetcher<T> {
    /// Replay `outcomes` in order.
    pub fn new(outcomes: Vec<Result<Poll<T>, ProviderError>>) -> Self {
        Self {
            script: Script::Sequence(outcomes.into()),
            calls: CallCounter::default(),
        }
    }

    /// Return `poll` on every fetch.
    pub fn repeating(poll: Poll<T>) -> Self {
        Self {
            script: Script::Repeat(poll),
            calls: CallCounter::default(),
        }
    }

    /// A handle on the number of fetches made.
    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl<T: Clone + Send> StatusFetcher<T> for ScriptedFetcher<T> {
    fn fetch(&mut self) -> impl Future<Output = Result<Poll<T>, ProviderError>> + Send {
        self.calls.increment();
        let outcome = match &mut self.script {
            Script::Sequence(outcomes) => outcomes.pop_front().unwrap_or_else(|| {
                Err(ProviderError::FailedPrecondition(
                    "scripted fetcher exhausted".to_string(),
                ))
            }),
            Script::Repeat(poll) => Ok(poll.clone()),
        };
        std::future::ready(outcome)
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a wait stopped on the given fatal status.
///
/// # Panics
///
/// Panics if the error is not [`WaitError::FatalState`] with `status`.
pub fn assert_fatal_state(err: &WaitError, status: &str) {
    match err {
        WaitError::FatalState { status: actual, .. } => assert_eq!(
            actual, status,
            "Expected fatal state '{}', but got '{}'",
            status, actual
        ),
        other => panic!("Expected fatal state '{}', but got: {:?}", status, other),
    }
}

/// Assert that a wait stopped on an unexpected status.
///
/// # Panics
///
/// Panics if the error is not [`WaitError::UnexpectedState`] with `status`.
pub fn assert_unexpected_state(err: &WaitError, status: &str) {
    match err {
        WaitError::UnexpectedState { status: actual, .. } => assert_eq!(
            actual, status,
            "Expected unexpected state '{}', but got '{}'",
            status, actual
        ),
        other => panic!("Expected unexpected state '{}', but got: {:?}", status, other),
    }
}

/// Assert that a wait timed out.
///
/// # Panics
///
/// Panics if the error is not [`WaitError::Timeout`].
pub fn assert_timeout(err: &WaitError) {
    assert!(err.is_timeout(), "Expected timeout, but got: {:?}", err);
}

/// Assert that a provider error wraps a wait that stopped with `check`.
///
/// # Panics
///
/// Panics if the error is not [`ProviderError::Wait`] or `check` rejects it.
pub fn assert_wait_error(err: &ProviderError, check: impl FnOnce(&WaitError) -> bool) {
    match err {
        ProviderError::Wait { source, .. } => {
            assert!(check(source), "Unexpected wait outcome: {:?}", source)
        },
        other => panic!("Expected a wait error, but got: {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_sequence() {
        let mut fetcher = ScriptedFetcher::new(vec![
            Ok(Poll::found(1, "CREATING")),
            Err(ProviderError::Unavailable("busy".to_string())),
        ]);
        let calls = fetcher.calls();

        assert_eq!(fetcher.fetch().await.unwrap().status, "CREATING");
        assert!(fetcher.fetch().await.unwrap_err().is_retryable());
        assert!(!fetcher.fetch().await.unwrap_err().is_retryable());
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_repeating() {
        let mut fetcher = ScriptedFetcher::repeating(Poll::found("x", "PENDING"));
        for _ in 0..5 {
            assert_eq!(fetcher.fetch().await.unwrap().status, "PENDING");
        }
        assert_eq!(fetcher.calls().get(), 5);
    }

    #[test]
    fn test_assert_fatal_state() {
        let err = WaitError::FatalState {
            status: "Failed".to_string(),
            reason: None,
        };
        assert_fatal_state(&err, "Failed");
    }

    #[test]
    #[should_panic(expected = "Expected fatal state")]
    fn test_assert_fatal_state_fails() {
        let err = WaitError::NotFound { checks: 1 };
        assert_fatal_state(&err, "Failed");
    }

    #[test]
    #[should_panic(expected = "Expected timeout")]
    fn test_assert_timeout_fails() {
        assert_timeout(&WaitError::Cancelled { last_status: None });
    }

    #[test]
    fn test_assert_wait_error() {
        let err = ProviderError::Wait {
            what: "fleet to stop".to_string(),
            source: WaitError::Cancelled { last_status: None },
        };
        assert_wait_error(&err, WaitError::is_cancelled);
    }
}
