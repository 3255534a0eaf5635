//! Route 53: record change propagation and traffic policies.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::WaiterConfig;
use crate::error::{ProviderError, WaitFailure};
use crate::retry::{retry, RetryError, RetryPolicy};
use crate::waiter::{wait, wait_found, NotFoundPolicy, Poll, WaitSpec};

/// Time allowed for a record change to propagate.
pub const CHANGE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Time allowed for a traffic policy instance to settle.
pub const TRAFFIC_POLICY_INSTANCE_OPERATION_TIMEOUT: Duration = Duration::from_secs(4 * 60);
/// Time allowed for a new traffic policy to become visible.
pub const TRAFFIC_POLICY_TIMEOUT: Duration = Duration::from_secs(4 * 60);

/// Error code for a traffic policy instance that does not exist.
pub const ERR_NO_SUCH_TRAFFIC_POLICY_INSTANCE: &str = "NoSuchTrafficPolicyInstance";
/// Error code for a traffic policy that does not exist.
pub const ERR_NO_SUCH_TRAFFIC_POLICY: &str = "NoSuchTrafficPolicy";

/// Record change statuses.
pub mod change_status {
    pub const PENDING: &str = "PENDING";
    pub const INSYNC: &str = "INSYNC";
}

/// Traffic policy instance states.
pub mod instance_state {
    pub const CREATING: &str = "Creating";
    pub const UPDATING: &str = "Updating";
    pub const APPLIED: &str = "Applied";
    pub const DELETING: &str = "Deleting";
    pub const FAILED: &str = "Failed";
    /// Reported when the instance no longer exists.
    pub const NOT_FOUND: &str = "NotFound";
}

/// A submitted batch of record changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeInfo {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

/// A traffic policy applied to a record name in a hosted zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficPolicyInstance {
    pub id: String,
    pub hosted_zone_id: String,
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub message: Option<String>,
    pub traffic_policy_id: String,
    pub traffic_policy_version: u32,
    pub ttl: i64,
}

/// A version of a traffic policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficPolicy {
    pub id: String,
    pub name: String,
    pub version: u32,
    pub document: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(rename = "type", default)]
    pub policy_type: Option<String>,
}

/// One entry of the account's traffic policy listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficPolicySummary {
    pub id: String,
    pub name: String,
    pub latest_version: u32,
    #[serde(rename = "type", default)]
    pub policy_type: Option<String>,
    #[serde(default)]
    pub traffic_policy_count: u32,
}

/// One page of a paginated Route 53 listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub is_truncated: bool,
    /// Marker to pass for the next page when `is_truncated` is set.
    #[serde(default)]
    pub next_marker: Option<String>,
}

/// Request to create a traffic policy instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTrafficPolicyInstanceInput {
    pub hosted_zone_id: String,
    pub name: String,
    pub traffic_policy_id: String,
    pub traffic_policy_version: u32,
    pub ttl: i64,
}

/// Request to point an instance at another policy version or TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateTrafficPolicyInstanceInput {
    pub id: String,
    pub traffic_policy_id: String,
    pub traffic_policy_version: u32,
    pub ttl: i64,
}

/// Request to create a traffic policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTrafficPolicyInput {
    pub name: String,
    pub document: String,
    pub comment: Option<String>,
}

/// Request to add a version to an existing traffic policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTrafficPolicyVersionInput {
    pub id: String,
    pub document: String,
    pub comment: Option<String>,
}

/// The Route 53 calls used by this module.
#[async_trait]
pub trait Route53Api: Send + Sync {
    /// Get a record change batch.
    async fn get_change(&self, change_id: &str) -> Result<Option<ChangeInfo>, ProviderError>;

    /// Get a traffic policy instance. Unknown ids fail with
    /// [`ERR_NO_SUCH_TRAFFIC_POLICY_INSTANCE`].
    async fn get_traffic_policy_instance(
        &self,
        id: &str,
    ) -> Result<TrafficPolicyInstance, ProviderError>;

    /// Create a traffic policy instance.
    async fn create_traffic_policy_instance(
        &self,
        input: &CreateTrafficPolicyInstanceInput,
    ) -> Result<TrafficPolicyInstance, ProviderError>;

    /// Update a traffic policy instance.
    async fn update_traffic_policy_instance(
        &self,
        input: &UpdateTrafficPolicyInstanceInput,
    ) -> Result<TrafficPolicyInstance, ProviderError>;

    /// Delete a traffic policy instance.
    async fn delete_traffic_policy_instance(&self, id: &str) -> Result<(), ProviderError>;

    /// Create a traffic policy.
    async fn create_traffic_policy(
        &self,
        input: &CreateTrafficPolicyInput,
    ) -> Result<TrafficPolicy, ProviderError>;

    /// List the account's traffic policies, starting after `marker`.
    async fn list_traffic_policies(
        &self,
        marker: Option<&str>,
    ) -> Result<ListPage<TrafficPolicySummary>, ProviderError>;

    /// Get one version of a traffic policy. Unknown policies fail with
    /// [`ERR_NO_SUCH_TRAFFIC_POLICY`].
    async fn get_traffic_policy(&self, id: &str, version: u32)
        -> Result<TrafficPolicy, ProviderError>;

    /// Add a version to a traffic policy.
    async fn create_traffic_policy_version(
        &self,
        input: &CreateTrafficPolicyVersionInput,
    ) -> Result<TrafficPolicy, ProviderError>;

    /// List the versions of a traffic policy, starting after `marker`.
    async fn list_traffic_policy_versions(
        &self,
        id: &str,
        marker: Option<&str>,
    ) -> Result<ListPage<TrafficPolicy>, ProviderError>;

    /// Delete one version of a traffic policy.
    async fn delete_traffic_policy(&self, id: &str, version: u32) -> Result<(), ProviderError>;
}

/// Find a traffic policy instance; `None` when it does not exist.
pub async fn find_traffic_policy_instance(
    api: &dyn Route53Api,
    id: &str,
) -> Result<Option<TrafficPolicyInstance>, ProviderError> {
    match api.get_traffic_policy_instance(id).await {
        Ok(instance) => Ok(Some(instance)),
        Err(err) if err.is_code(ERR_NO_SUCH_TRAFFIC_POLICY_INSTANCE) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Current status of a record change.
pub async fn change_info_status(
    api: &dyn Route53Api,
    change_id: &str,
) -> Result<Poll<ChangeInfo>, ProviderError> {
    Ok(match api.get_change(change_id).await? {
        Some(change) => {
            let status = change.status.clone();
            Poll::found(change, status)
        },
        None => Poll::gone(),
    })
}

/// Current state of a traffic policy instance, with its message.
pub async fn traffic_policy_instance_state(
    api: &dyn Route53Api,
    id: &str,
) -> Result<Poll<TrafficPolicyInstance>, ProviderError> {
    Ok(match find_traffic_policy_instance(api, id).await? {
        Some(instance) => {
            let state = instance.state.clone();
            let message = instance.message.clone().unwrap_or_default();
            Poll::found(instance, state).with_reason(message)
        },
        None => Poll::gone(),
    })
}

/// Wait for a record change to reach every Route 53 name server.
pub async fn change_in_sync(
    api: &dyn Route53Api,
    change_id: &str,
    timeout: Duration,
    polling: &WaiterConfig,
) -> Result<ChangeInfo, WaitFailure<ChangeInfo>> {
    let spec = polling
        .apply(WaitSpec::builder(timeout))
        .pending([change_status::PENDING])
        .target([change_status::INSYNC])
        .initial_delay(Duration::from_secs(1))
        .build()
        .map_err(WaitFailure::new)?;

    wait_found(&spec, move || change_info_status(api, change_id)).await
}

/// Wait for a traffic policy instance to be applied.
///
/// A `Failed` instance stops the wait with the instance's message.
pub async fn traffic_policy_instance_applied(
    api: &dyn Route53Api,
    id: &str,
    timeout: Duration,
    polling: &WaiterConfig,
) -> Result<TrafficPolicyInstance, WaitFailure<TrafficPolicyInstance>> {
    let spec = polling
        .apply(WaitSpec::builder(timeout))
        .pending([instance_state::CREATING, instance_state::UPDATING])
        .target([instance_state::APPLIED])
        .fatal([instance_state::FAILED])
        .not_found(NotFoundPolicy::Fail)
        .build()
        .map_err(WaitFailure::new)?;

    wait_found(&spec, move || traffic_policy_instance_state(api, id)).await
}

/// Wait for a traffic policy instance to disappear.
pub async fn traffic_policy_instance_deleted(
    api: &dyn Route53Api,
    id: &str,
    timeout: Duration,
    polling: &WaiterConfig,
) -> Result<(), WaitFailure<TrafficPolicyInstance>> {
    let spec = polling
        .apply(WaitSpec::builder(timeout))
        .pending([instance_state::DELETING])
        .target([instance_state::NOT_FOUND])
        .not_found(NotFoundPolicy::Sentinel(instance_state::NOT_FOUND.to_string()))
        .build()
        .map_err(WaitFailure::new)?;

    wait(&spec, move || traffic_policy_instance_state(api, id))
        .await
        .map(drop)
}

/// Configuration of a traffic policy instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrafficPolicyInstanceConfig {
    pub hosted_zone_id: String,
    pub name: String,
    pub traffic_policy_id: String,
    pub traffic_policy_version: u32,
    pub ttl: i64,
}

/// State recorded for a traffic policy instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficPolicyInstanceState {
    pub id: String,
    pub hosted_zone_id: String,
    /// Record name without the trailing dot, lowercased.
    pub name: String,
    pub state: String,
    pub message: Option<String>,
    pub traffic_policy_id: String,
    pub traffic_policy_version: u32,
    pub ttl: i64,
}

impl From<TrafficPolicyInstance> for TrafficPolicyInstanceState {
    fn from(instance: TrafficPolicyInstance) -> Self {
        Self {
            name: normalize_record_name(&instance.name),
            id: instance.id,
            hosted_zone_id: instance.hosted_zone_id,
            state: instance.state,
            message: instance.message,
            traffic_policy_id: instance.traffic_policy_id,
            traffic_policy_version: instance.traffic_policy_version,
            ttl: instance.ttl,
        }
    }
}

/// Record names compare case-insensitively and without the root dot.
pub fn normalize_record_name(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_lowercase()
}

/// Create a traffic policy instance and wait for it to be applied.
#[instrument(skip(api, config, polling), fields(name = %config.name))]
pub async fn create_traffic_policy_instance(
    api: &dyn Route53Api,
    config: &TrafficPolicyInstanceConfig,
    polling: &WaiterConfig,
) -> Result<TrafficPolicyInstanceState, ProviderError> {
    let input = CreateTrafficPolicyInstanceInput {
        hosted_zone_id: config.hosted_zone_id.clone(),
        name: config.name.clone(),
        traffic_policy_id: config.traffic_policy_id.clone(),
        traffic_policy_version: config.traffic_policy_version,
        ttl: config.ttl,
    };

    let input = &input;
    let created = retry(
        RetryPolicy::new(TRAFFIC_POLICY_INSTANCE_OPERATION_TIMEOUT),
        move || async move {
            api.create_traffic_policy_instance(input)
                .await
                .map_err(|e| RetryError::on_code(e, ERR_NO_SUCH_TRAFFIC_POLICY_INSTANCE))
        },
    )
    .await?;

    let applied = traffic_policy_instance_applied(
        api,
        &created.id,
        TRAFFIC_POLICY_INSTANCE_OPERATION_TIMEOUT,
        polling,
    )
    .await
    .map_err(|f| {
        f.context(format!(
            "Route53 Traffic Policy Instance ({}) to be Applied",
            created.id
        ))
    })?;

    info!(id = %applied.id, "traffic policy instance applied");
    Ok(applied.into())
}

/// Read a traffic policy instance; `None` when it no longer exists.
#[instrument(skip(api))]
pub async fn read_traffic_policy_instance(
    api: &dyn Route53Api,
    id: &str,
) -> Result<Option<TrafficPolicyInstanceState>, ProviderError> {
    match find_traffic_policy_instance(api, id).await? {
        Some(instance) => Ok(Some(instance.into())),
        None => {
            warn!(id = %id, "Route53 Traffic Policy Instance not found, removing from state");
            Ok(None)
        },
    }
}

/// Point an instance at a new policy version or TTL and wait for it to be
/// applied again.
#[instrument(skip(api, config, polling))]
pub async fn update_traffic_policy_instance(
    api: &dyn Route53Api,
    id: &str,
    config: &TrafficPolicyInstanceConfig,
    polling: &WaiterConfig,
) -> Result<TrafficPolicyInstanceState, ProviderError> {
    let input = UpdateTrafficPolicyInstanceInput {
        id: id.to_string(),
        traffic_policy_id: config.traffic_policy_id.clone(),
        traffic_policy_version: config.traffic_policy_version,
        ttl: config.ttl,
    };

    api.update_traffic_policy_instance(&input).await?;

    let applied =
        traffic_policy_instance_applied(api, id, TRAFFIC_POLICY_INSTANCE_OPERATION_TIMEOUT, polling)
            .await
            .map_err(|f| {
                f.context(format!("Route53 Traffic Policy Instance ({}) to be Applied", id))
            })?;

    info!(id = %id, version = applied.traffic_policy_version, "traffic policy instance updated");
    Ok(applied.into())
}

/// Delete a traffic policy instance and wait until it is gone.
///
/// An instance that is already gone counts as deleted.
#[instrument(skip(api, polling))]
pub async fn delete_traffic_policy_instance(
    api: &dyn Route53Api,
    id: &str,
    polling: &WaiterConfig,
) -> Result<(), ProviderError> {
    match api.delete_traffic_policy_instance(id).await {
        Err(err) if err.is_code(ERR_NO_SUCH_TRAFFIC_POLICY_INSTANCE) => return Ok(()),
        other => other?,
    }

    traffic_policy_instance_deleted(api, id, TRAFFIC_POLICY_INSTANCE_OPERATION_TIMEOUT, polling)
        .await
        .map_err(|f| f.context(format!("Route53 Traffic Policy Instance ({}) to be Deleted", id)))
}

/// Create a traffic policy, retrying while Route 53 reports it missing.
#[instrument(skip(api, input), fields(name = %input.name))]
pub async fn create_traffic_policy(
    api: &dyn Route53Api,
    input: &CreateTrafficPolicyInput,
) -> Result<TrafficPolicy, ProviderError> {
    retry(RetryPolicy::new(TRAFFIC_POLICY_TIMEOUT), move || async move {
        api.create_traffic_policy(input)
            .await
            .map_err(|e| RetryError::on_code(e, ERR_NO_SUCH_TRAFFIC_POLICY))
    })
    .await
}

/// Find a traffic policy in the account's listing, following pages.
pub async fn find_traffic_policy_by_id(
    api: &dyn Route53Api,
    id: &str,
) -> Result<Option<TrafficPolicySummary>, ProviderError> {
    let mut marker: Option<String> = None;

    loop {
        let page = api.list_traffic_policies(marker.as_deref()).await?;
        if let Some(summary) = page.items.into_iter().find(|summary| summary.id == id) {
            return Ok(Some(summary));
        }

        match page.next_marker {
            Some(next) if page.is_truncated => marker = Some(next),
            _ => return Ok(None),
        }
    }
}

/// Read the latest version of a traffic policy; `None` when it no longer
/// exists.
#[instrument(skip(api))]
pub async fn read_traffic_policy(
    api: &dyn Route53Api,
    id: &str,
) -> Result<Option<TrafficPolicy>, ProviderError> {
    let Some(summary) = find_traffic_policy_by_id(api, id).await? else {
        warn!(id = %id, "Route53 Traffic Policy not found, removing from state");
        return Ok(None);
    };

    match api.get_traffic_policy(id, summary.latest_version).await {
        Ok(policy) => Ok(Some(policy)),
        Err(err) if err.is_code(ERR_NO_SUCH_TRAFFIC_POLICY) => {
            warn!(id = %id, "Route53 Traffic Policy not found, removing from state");
            Ok(None)
        },
        Err(err) => Err(err),
    }
}

/// Publish a new document as the next version of a traffic policy.
#[instrument(skip(api, document, comment))]
pub async fn update_traffic_policy(
    api: &dyn Route53Api,
    id: &str,
    document: &str,
    comment: Option<&str>,
) -> Result<TrafficPolicy, ProviderError> {
    let input = CreateTrafficPolicyVersionInput {
        id: id.to_string(),
        document: document.to_string(),
        comment: comment.map(str::to_string),
    };

    let policy = api.create_traffic_policy_version(&input).await?;
    info!(id = %id, version = policy.version, "traffic policy version created");
    Ok(policy)
}

/// Delete every version of a traffic policy.
///
/// A policy that is already gone counts as deleted.
#[instrument(skip(api))]
pub async fn delete_traffic_policy(api: &dyn Route53Api, id: &str) -> Result<(), ProviderError> {
    let mut versions = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let page = api.list_traffic_policy_versions(id, marker.as_deref()).await?;
        versions.extend(page.items);

        match page.next_marker {
            Some(next) if page.is_truncated => marker = Some(next),
            _ => break,
        }
    }

    for policy in &versions {
        match api.delete_traffic_policy(&policy.id, policy.version).await {
            Err(err) if err.is_code(ERR_NO_SUCH_TRAFFIC_POLICY) => return Ok(()),
            other => other?,
        }
        debug!(id = %policy.id, version = policy.version, "traffic policy version deleted");
    }

    info!(id = %id, versions = versions.len(), "traffic policy deleted");
    Ok(())
}

/// Import a traffic policy from `TRAFFIC-POLICY-ID/VERSION`.
#[instrument(skip(api))]
pub async fn import_traffic_policy(
    api: &dyn Route53Api,
    import_id: &str,
) -> Result<TrafficPolicy, ProviderError> {
    let (id, version) = parse_traffic_policy_id(import_id)?;

    match api.get_traffic_policy(&id, version).await {
        Err(err) if err.is_code(ERR_NO_SUCH_TRAFFIC_POLICY) => Err(ProviderError::NotFound(
            format!("Route53 Traffic Policy ({}) version {}", id, version),
        )),
        other => other,
    }
}

/// Split a traffic policy import id, `TRAFFIC-POLICY-ID/VERSION`.
pub fn parse_traffic_policy_id(id: &str) -> Result<(String, u32), ProviderError> {
    let invalid = || {
        ProviderError::InvalidRequest(format!(
            "unexpected format of ID ({:?}), expected traffic-policy-id/traffic-policy-version",
            id
        ))
    };

    let (policy_id, version) = id.split_once('/').ok_or_else(invalid)?;
    if policy_id.is_empty() || version.is_empty() || version.contains('/') {
        return Err(invalid());
    }
    let version = version
        .parse()
        .map_err(|_| ProviderError::InvalidRequest(format!("cannot convert to int: {}", version)))?;
    Ok((policy_id.to_string(), version))
}
