//! Hemmer Provider Waiter
//!
//! State-change waiting and eventual-consistency retries for Hemmer
//! providers that manage cloud resources. It follows the pattern of
//! Terraform's `StateChangeConf`: a lifecycle operation issues a mutating
//! call, then polls the resource until it reaches a target status.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Waiter**: [`wait`] polls a [`StatusFetcher`] against a [`WaitSpec`]
//!   (pending, target and fatal statuses, timeout, backoff) with cancellation
//! - **Retry**: [`retry`] repeats calls that fail while a dependency propagates
//! - **Error types**: [`ProviderError`], [`WaitError`] and [`WaitFailure`]
//! - **Configuration**: per-resource [`Timeouts`] and provider [`WaiterConfig`]
//! - **Services**: status functions, waiters and lifecycle operations for
//!   Directory Service, Route 53, AppStream, Cost Explorer and Data Pipeline
//! - **Logging**: Integration with `tracing` for structured logging
//! - **Testing**: scripted fetchers and assertions in [`testing`]
//!
//! # Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use hemmer_provider_waiter::{wait_found, Poll, ProviderError, WaitSpec};
//!
//! async fn wait_for_cluster(api: &MyClient, id: &str) -> Result<Cluster, ProviderError> {
//!     let spec = WaitSpec::builder(Duration::from_secs(20 * 60))
//!         .pending(["CREATING"])
//!         .target(["ACTIVE"])
//!         .fatal(["FAILED"])
//!         .build()
//!         .map_err(|e| ProviderError::Validation(e.to_string()))?;
//!
//!     wait_found(&spec, || async {
//!         Ok(match api.describe_cluster(id).await? {
//!             Some(cluster) => {
//!                 let status = cluster.status.clone();
//!                 Poll::found(cluster, status)
//!             }
//!             None => Poll::gone(),
//!         })
//!     })
//!     .await
//!     .map_err(|f| f.context(format!("cluster ({}) to become active", id)))
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod service;
pub mod testing;
pub mod waiter;

// Re-export main types at crate root
pub use config::{Timeouts, WaiterConfig};
pub use error::{ProviderError, WaitError, WaitFailure};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use retry::{retry, RetryError, RetryPolicy};
pub use waiter::{
    wait, wait_found, wait_with_cancel, NotFoundPolicy, Poll, StatusFetcher, WaitSpec,
    WaitSpecBuilder,
};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tokio_util::sync::CancellationToken;
pub use tracing;
