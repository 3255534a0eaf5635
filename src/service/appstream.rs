//! AppStream: fleet start/stop and image lookups.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::WaiterConfig;
use crate::error::{ProviderError, WaitFailure};
use crate::waiter::{wait_found, NotFoundPolicy, Poll, WaitSpec};

/// Time allowed for a fleet to start or stop.
pub const FLEET_OPERATION_TIMEOUT: Duration = Duration::from_secs(180 * 60);

/// Error code for a fleet that does not exist.
pub const ERR_RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

/// Fleet states.
pub mod fleet_state {
    pub const STARTING: &str = "STARTING";
    pub const RUNNING: &str = "RUNNING";
    pub const STOPPING: &str = "STOPPING";
    pub const STOPPED: &str = "STOPPED";
}

/// A problem reported by a fleet, such as a failed instance launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetError {
    pub error_code: String,
    pub error_message: String,
}

/// An AppStream fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fleet {
    pub name: String,
    #[serde(default)]
    pub arn: Option<String>,
    pub state: String,
    #[serde(default)]
    pub fleet_errors: Vec<FleetError>,
}

impl Fleet {
    /// Fleet errors joined into one message.
    pub fn error_summary(&self) -> String {
        self.fleet_errors
            .iter()
            .map(|e| format!("{}: {}", e.error_code, e.error_message))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// An application bundled into an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub launch_path: Option<String>,
}

/// An AppStream image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub name: String,
    pub arn: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub base_image_arn: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub applications: Vec<Application>,
}

/// Filters for describing images. Unset fields match every image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFilter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arn: Option<String>,
    /// Visibility: `PUBLIC`, `PRIVATE` or `SHARED`.
    #[serde(rename = "type", default)]
    pub visibility: Option<String>,
}

/// The AppStream calls used by this module.
#[async_trait]
pub trait AppStreamApi: Send + Sync {
    /// Describe fleets by name.
    async fn describe_fleets(&self, names: &[String]) -> Result<Vec<Fleet>, ProviderError>;

    /// Start a stopped fleet.
    async fn start_fleet(&self, name: &str) -> Result<(), ProviderError>;

    /// Stop a running fleet.
    async fn stop_fleet(&self, name: &str) -> Result<(), ProviderError>;

    /// Describe images matching `filter`.
    async fn describe_images(&self, filter: &ImageFilter) -> Result<Vec<Image>, ProviderError>;
}

/// Find a fleet by name; `None` when it does not exist.
pub async fn find_fleet_by_name(
    api: &dyn AppStreamApi,
    name: &str,
) -> Result<Option<Fleet>, ProviderError> {
    match api.describe_fleets(&[name.to_string()]).await {
        Ok(fleets) => Ok(fleets.into_iter().find(|fleet| fleet.name == name)),
        Err(err) if err.is_code(ERR_RESOURCE_NOT_FOUND) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Current state of a fleet. Fleet errors become the reason.
pub async fn fleet_status(api: &dyn AppStreamApi, name: &str) -> Result<Poll<Fleet>, ProviderError> {
    Ok(match find_fleet_by_name(api, name).await? {
        Some(fleet) => {
            let state = fleet.state.clone();
            let reason = fleet.error_summary();
            Poll::found(fleet, state).with_reason(reason)
        },
        None => Poll::gone(),
    })
}

/// Wait for a fleet to be running.
///
/// A fleet that falls back to `STOPPED` failed to start.
pub async fn fleet_running(
    api: &dyn AppStreamApi,
    name: &str,
    timeout: Duration,
    polling: &WaiterConfig,
) -> Result<Fleet, WaitFailure<Fleet>> {
    let spec = polling
        .apply(WaitSpec::builder(timeout))
        .pending([fleet_state::STARTING])
        .target([fleet_state::RUNNING])
        .fatal([fleet_state::STOPPED])
        .not_found(NotFoundPolicy::Fail)
        .build()
        .map_err(WaitFailure::new)?;

    wait_found(&spec, move || fleet_status(api, name)).await
}

/// Wait for a fleet to be stopped.
pub async fn fleet_stopped(
    api: &dyn AppStreamApi,
    name: &str,
    timeout: Duration,
    polling: &WaiterConfig,
) -> Result<Fleet, WaitFailure<Fleet>> {
    let spec = polling
        .apply(WaitSpec::builder(timeout))
        .pending([fleet_state::STOPPING])
        .target([fleet_state::STOPPED])
        .not_found(NotFoundPolicy::Fail)
        .build()
        .map_err(WaitFailure::new)?;

    wait_found(&spec, move || fleet_status(api, name)).await
}

fn fleet_not_found(name: &str) -> ProviderError {
    ProviderError::NotFound(format!("AppStream Fleet ({})", name))
}

/// Start a fleet and wait until it is running.
///
/// A fleet that is already running is returned as is.
#[instrument(skip(api, polling))]
pub async fn start_fleet(
    api: &dyn AppStreamApi,
    name: &str,
    timeout: Duration,
    polling: &WaiterConfig,
) -> Result<Fleet, ProviderError> {
    let fleet = find_fleet_by_name(api, name)
        .await?
        .ok_or_else(|| fleet_not_found(name))?;
    if fleet.state == fleet_state::RUNNING {
        debug!(name = %name, "fleet already running");
        return Ok(fleet);
    }

    // A fleet still stopping must settle before it can be started.
    if fleet.state == fleet_state::STOPPING {
        fleet_stopped(api, name, timeout, polling)
            .await
            .map_err(|f| f.context(format!("AppStream Fleet ({}) to be stopped", name)))?;
    }

    if fleet.state != fleet_state::STARTING {
        api.start_fleet(name).await?;
    }

    let fleet = fleet_running(api, name, timeout, polling)
        .await
        .map_err(|f| f.context(format!("AppStream Fleet ({}) to be running", name)))?;
    info!(name = %name, "fleet running");
    Ok(fleet)
}

/// Stop a fleet and wait until it is stopped.
///
/// A fleet that is already stopped is returned as is.
#[instrument(skip(api, polling))]
pub async fn stop_fleet(
    api: &dyn AppStreamApi,
    name: &str,
    timeout: Duration,
    polling: &WaiterConfig,
) -> Result<Fleet, ProviderError> {
    let fleet = find_fleet_by_name(api, name)
        .await?
        .ok_or_else(|| fleet_not_found(name))?;
    if fleet.state == fleet_state::STOPPED {
        debug!(name = %name, "fleet already stopped");
        return Ok(fleet);
    }

    if fleet.state == fleet_state::STARTING {
        fleet_running(api, name, timeout, polling)
            .await
            .map_err(|f| f.context(format!("AppStream Fleet ({}) to be running", name)))?;
    }

    if fleet.state != fleet_state::STOPPING {
        api.stop_fleet(name).await?;
    }

    let fleet = fleet_stopped(api, name, timeout, polling)
        .await
        .map_err(|f| f.context(format!("AppStream Fleet ({}) to be stopped", name)))?;
    info!(name = %name, "fleet stopped");
    Ok(fleet)
}

/// Look up exactly one image.
///
/// No match, or more than one, is an error.
pub async fn read_image(api: &dyn AppStreamApi, filter: &ImageFilter) -> Result<Image, ProviderError> {
    let mut images = api.describe_images(filter).await?;

    match images.len() {
        0 => Err(ProviderError::NotFound(
            "your query returned no results. please change your search criteria and try again"
                .to_string(),
        )),
        1 => Ok(images.remove(0)),
        _ => Err(ProviderError::InvalidRequest(
            "your query returned more than one result. please change your search criteria and try again"
                .to_string(),
        )),
    }
}

/// Look up every image matching `filter`.
pub async fn list_images(
    api: &dyn AppStreamApi,
    filter: &ImageFilter,
) -> Result<Vec<Image>, ProviderError> {
    api.describe_images(filter).await
}
