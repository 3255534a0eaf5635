//! Service integrations built on the waiter and retry primitives.
//!
//! Each module declares the subset of a service API it calls as an
//! `async_trait` trait, so lifecycle operations run against any client
//! (or a fake in tests). Field-level docs live in the service's API
//! reference; the structs here mirror it.

#[allow(missing_docs)]
pub mod appstream;
#[allow(missing_docs)]
pub mod costexplorer;
#[allow(missing_docs)]
pub mod datapipeline;
#[allow(missing_docs)]
pub mod directoryservice;
#[allow(missing_docs)]
pub mod route53;
