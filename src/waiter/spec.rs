//! Wait configuration and poll results.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::WaitError;

/// Default lower bound between polls.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound between polls.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// What the waiter does when a poll finds no resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NotFoundPolicy {
    /// Keep polling; creation may not be visible yet.
    #[default]
    Retry,
    /// Keep polling, but give up after this many consecutive absent polls.
    RetryAtMost(u32),
    /// Treat absence as this status (e.g. a deletion's terminal status).
    Sentinel(String),
    /// Absence is an error straight away.
    Fail,
}

/// The outcome of one status fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Poll<T> {
    /// The resource, or `None` when it does not exist.
    pub resource: Option<T>,
    /// Current status. Meaningless when `resource` is `None`.
    pub status: String,
    /// Human-readable reason accompanying the status.
    pub reason: Option<String>,
}

impl<T> Poll<T> {
    /// A resource that exists with the given status.
    pub fn found(resource: T, status: impl Into<String>) -> Self {
        Self {
            resource: Some(resource),
            status: status.into(),
            reason: None,
        }
    }

    /// No resource exists.
    pub fn gone() -> Self {
        Self {
            resource: None,
            status: String::new(),
            reason: None,
        }
    }

    /// Attach a reason (e.g. a stage reason) to the status.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        self.reason = (!reason.is_empty()).then_some(reason);
        self
    }
}

/// Immutable configuration for a single wait.
///
/// Built with [`WaitSpec::builder`]; `build` rejects overlapping status sets.
#[derive(Debug, Clone)]
pub struct WaitSpec {
    pending: BTreeSet<String>,
    target: BTreeSet<String>,
    fatal: BTreeSet<String>,
    timeout: Duration,
    min_delay: Duration,
    max_delay: Duration,
    initial_delay: Duration,
    not_found: NotFoundPolicy,
    continuous_target_occurrence: u32,
}

impl WaitSpec {
    /// Start building a wait that gives up after `timeout`.
    pub fn builder(timeout: Duration) -> WaitSpecBuilder {
        WaitSpecBuilder {
            pending: Vec::new(),
            target: Vec::new(),
            fatal: Vec::new(),
            timeout,
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            initial_delay: Duration::ZERO,
            not_found: NotFoundPolicy::default(),
            continuous_target_occurrence: 1,
        }
    }

    /// Statuses that mean "still in progress".
    pub fn pending(&self) -> &BTreeSet<String> {
        &self.pending
    }

    /// Statuses that mean success.
    pub fn target(&self) -> &BTreeSet<String> {
        &self.target
    }

    /// Statuses that mean unrecoverable failure.
    pub fn fatal(&self) -> &BTreeSet<String> {
        &self.fatal
    }

    /// Maximum time to wait.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Lower backoff bound.
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Upper backoff bound.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay before the first poll.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Policy applied when a poll finds no resource.
    pub fn not_found(&self) -> &NotFoundPolicy {
        &self.not_found
    }

    /// Consecutive target observations required for success.
    pub fn continuous_target_occurrence(&self) -> u32 {
        self.continuous_target_occurrence
    }

    /// Every declared status, sorted.
    pub fn expected(&self) -> Vec<String> {
        let all: BTreeSet<&String> = self
            .pending
            .iter()
            .chain(&self.target)
            .chain(&self.fatal)
            .collect();
        all.into_iter().cloned().collect()
    }
}

/// Builder for [`WaitSpec`].
#[derive(Debug, Clone)]
pub struct WaitSpecBuilder {
    pending: Vec<String>,
    target: Vec<String>,
    fatal: Vec<String>,
    timeout: Duration,
    min_delay: Duration,
    max_delay: Duration,
    initial_delay: Duration,
    not_found: NotFoundPolicy,
    continuous_target_occurrence: u32,
}

impl WaitSpecBuilder {
    /// Add in-progress statuses.
    pub fn pending<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending.extend(statuses.into_iter().map(Into::into));
        self
    }

    /// Add success statuses.
    pub fn target<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target.extend(statuses.into_iter().map(Into::into));
        self
    }

    /// Add unrecoverable statuses.
    pub fn fatal<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fatal.extend(statuses.into_iter().map(Into::into));
        self
    }

    /// Set both backoff bounds.
    pub fn delays(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max;
        self
    }

    /// Delay before the first poll.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the not-found policy.
    pub fn not_found(mut self, policy: NotFoundPolicy) -> Self {
        self.not_found = policy;
        self
    }

    /// Require `count` consecutive target observations.
    pub fn continuous_target_occurrence(mut self, count: u32) -> Self {
        self.continuous_target_occurrence = count;
        self
    }

    /// Validate and build the spec.
    pub fn build(self) -> Result<WaitSpec, WaitError> {
        let pending = collect_set("pending", self.pending)?;
        let target = collect_set("target", self.target)?;
        let fatal = collect_set("fatal", self.fatal)?;

        let sets = [("pending", &pending), ("target", &target), ("fatal", &fatal)];
        for (i, (first_name, first)) in sets.iter().enumerate() {
            for (second_name, second) in &sets[i + 1..] {
                if let Some(status) = first.intersection(second).next() {
                    return Err(WaitError::InvalidSpec(format!(
                        "status '{}' is both {} and {}",
                        status, first_name, second_name
                    )));
                }
            }
        }

        if target.is_empty() {
            return Err(WaitError::InvalidSpec(
                "at least one target status is required".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(WaitError::InvalidSpec(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.min_delay.is_zero() {
            return Err(WaitError::InvalidSpec(
                "min delay must be greater than zero".to_string(),
            ));
        }
        if self.min_delay > self.max_delay {
            return Err(WaitError::InvalidSpec(format!(
                "min delay {:?} exceeds max delay {:?}",
                self.min_delay, self.max_delay
            )));
        }
        if self.continuous_target_occurrence == 0 {
            return Err(WaitError::InvalidSpec(
                "continuous target occurrence must be at least 1".to_string(),
            ));
        }
        match &self.not_found {
            NotFoundPolicy::Sentinel(status)
                if !target.contains(status) && !fatal.contains(status) =>
            {
                return Err(WaitError::InvalidSpec(format!(
                    "not-found status '{}' must be a target or fatal status",
                    status
                )));
            },
            NotFoundPolicy::RetryAtMost(0) => {
                return Err(WaitError::InvalidSpec(
                    "not-found check limit must be at least 1".to_string(),
                ));
            },
            _ => {},
        }

        Ok(WaitSpec {
            pending,
            target,
            fatal,
            timeout: self.timeout,
            min_delay: self.min_delay,
            max_delay: self.max_delay,
            initial_delay: self.initial_delay,
            not_found: self.not_found,
            continuous_target_occurrence: self.continuous_target_occurrence,
        })
    }
}

fn collect_set(name: &str, statuses: Vec<String>) -> Result<BTreeSet<String>, WaitError> {
    let mut set = BTreeSet::new();
    for status in statuses {
        if status.is_empty() {
            return Err(WaitError::InvalidSpec(format!(
                "empty status in {} set",
                name
            )));
        }
        set.insert(status);
    }
    Ok(set)
}
