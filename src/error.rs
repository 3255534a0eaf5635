//! Error types for provider lifecycle operations and state waiters.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when implementing a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A service returned a coded error (e.g. `EntityDoesNotExistException`).
    #[error("{code}: {message}")]
    Api {
        /// The service error code.
        code: String,
        /// The service error message.
        message: String,
    },

    /// Waiting for a resource to converge failed.
    #[error("error waiting for {what}: {source}")]
    Wait {
        /// What was being waited for, e.g. `Route53 Traffic Policy Instance (abc) to be Applied`.
        what: String,
        /// The terminal wait outcome.
        #[source]
        source: WaitError,
    },
}

impl ProviderError {
    /// Build a coded service error.
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Get the error message as a string.
    ///
    /// Returns a reference to the error message for any variant.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::AlreadyExists(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::ResourceExhausted(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::InvalidRequest(msg) => msg,
            Self::Api { message, .. } => message,
            Self::Wait { what, .. } => what,
        }
    }

    /// Whether the error is transient and the call may succeed if repeated.
    ///
    /// Throttling, unavailability and request deadlines are transient; a
    /// waiter keeps polling through them.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::ResourceExhausted(_) | Self::DeadlineExceeded(_)
        )
    }

    /// Whether this is a coded service error with the given code.
    pub fn is_code(&self, expected: &str) -> bool {
        matches!(self, Self::Api { code, .. } if code == expected)
    }

    /// Whether the error means the remote entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Terminal outcomes of a state wait, other than success.
#[derive(Debug, Error)]
pub enum WaitError {
    /// The resource reached a status declared unrecoverable.
    #[error("unexpected state '{status}', wanted target{}", reason_suffix(.reason))]
    FatalState {
        /// The fatal status observed.
        status: String,
        /// Reason reported alongside the status, if any.
        reason: Option<String>,
    },

    /// The resource reported a status outside every declared set.
    #[error("unexpected state '{status}', wanted one of {expected:?}")]
    UnexpectedState {
        /// The status observed.
        status: String,
        /// Every status the wait declared (pending, target and fatal).
        expected: Vec<String>,
    },

    /// The deadline passed before the resource converged.
    #[error("timeout while waiting for state to become target (last state: '{}', timeout: {timeout:?})", .last_status.as_deref().unwrap_or(""))]
    Timeout {
        /// The last status observed, if any poll produced one.
        last_status: Option<String>,
        /// Time spent waiting.
        elapsed: Duration,
        /// The configured timeout.
        timeout: Duration,
    },

    /// The caller cancelled the wait.
    #[error("wait cancelled (last state: '{}')", .last_status.as_deref().unwrap_or(""))]
    Cancelled {
        /// The last status observed before cancellation.
        last_status: Option<String>,
    },

    /// The resource could not be found and the not-found policy gave up.
    #[error("couldn't find resource ({checks} consecutive checks)")]
    NotFound {
        /// Consecutive polls that observed no resource.
        checks: u32,
    },

    /// The status fetcher returned a non-transient error.
    #[error("{0}")]
    Fetch(#[source] Box<ProviderError>),

    /// The wait was configured inconsistently.
    #[error("invalid wait configuration: {0}")]
    InvalidSpec(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) if !reason.is_empty() => format!(": {}", reason),
        _ => String::new(),
    }
}

impl WaitError {
    /// Whether the wait ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether the wait stopped on a fatal status.
    pub fn is_fatal_state(&self) -> bool {
        matches!(self, Self::FatalState { .. })
    }

    /// Whether the wait was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The last status observed before the wait stopped, when known.
    pub fn last_status(&self) -> Option<&str> {
        match self {
            Self::FatalState { status, .. } | Self::UnexpectedState { status, .. } => Some(status),
            Self::Timeout { last_status, .. } | Self::Cancelled { last_status } => {
                last_status.as_deref()
            },
            _ => None,
        }
    }
}

impl From<ProviderError> for WaitError {
    fn from(err: ProviderError) -> Self {
        Self::Fetch(Box::new(err))
    }
}

/// A failed wait: the error kind plus the last resource observed.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct WaitFailure<T: std::fmt::Debug> {
    /// Why the wait stopped.
    #[source]
    pub error: WaitError,
    /// The resource from the last poll that returned one, if any.
    pub resource: Option<T>,
}

impl<T: std::fmt::Debug> WaitFailure<T> {
    /// A failure with no resource attached.
    pub fn new(error: WaitError) -> Self {
        Self {
            error,
            resource: None,
        }
    }

    /// Attach operation context, converting into a [`ProviderError`].
    pub fn context(self, what: impl Into<String>) -> ProviderError {
        ProviderError::Wait {
            what: what.into(),
            source: self.error,
        }
    }

    /// Borrow the wait error.
    pub fn kind(&self) -> &WaitError {
        &self.error
    }
}
