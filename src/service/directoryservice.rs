//! Directory Service: directory stages and cross-account directory sharing.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::{Timeouts, WaiterConfig};
use crate::error::{ProviderError, WaitFailure};
use crate::retry::{retry, RetryError, RetryPolicy};
use crate::waiter::{wait, wait_found, NotFoundPolicy, Poll, WaitSpec};

/// Time allowed for a new directory to become active.
pub const DIRECTORY_CREATED_TIMEOUT: Duration = Duration::from_secs(60 * 60);
/// Time allowed for a directory to disappear.
pub const DIRECTORY_DELETED_TIMEOUT: Duration = Duration::from_secs(60 * 60);
/// Time allowed for share and accept operations to converge.
pub const SHARE_DIRECTORY_OPERATION_TIMEOUT: Duration = Duration::from_secs(4 * 60);
/// Time allowed for an unshared directory to disappear.
pub const SHARE_DIRECTORY_DELETED_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Consecutive empty lookups tolerated while a new share becomes visible.
const SHARE_NOT_FOUND_CHECKS: u32 = 20;

/// Error code for a directory that does not exist (yet).
pub const ERR_DIRECTORY_DOES_NOT_EXIST: &str = "DirectoryDoesNotExistException";
/// Error code for an entity that does not exist.
pub const ERR_ENTITY_DOES_NOT_EXIST: &str = "EntityDoesNotExistException";
/// Error code for a directory that is not shared.
pub const ERR_DIRECTORY_NOT_SHARED: &str = "DirectoryNotSharedException";

/// Directory stages.
pub mod stage {
    pub const REQUESTED: &str = "Requested";
    pub const CREATING: &str = "Creating";
    pub const CREATED: &str = "Created";
    pub const ACTIVE: &str = "Active";
    pub const DELETING: &str = "Deleting";
    pub const DELETED: &str = "Deleted";
    pub const FAILED: &str = "Failed";
}

/// Shared directory statuses.
pub mod share_status {
    pub const SHARING: &str = "Sharing";
    pub const SHARED: &str = "Shared";
    pub const SHARE_FAILED: &str = "ShareFailed";
    pub const PENDING_ACCEPTANCE: &str = "PendingAcceptance";
    pub const DELETING: &str = "Deleting";
    pub const DELETED: &str = "Deleted";
}

/// How a directory is shared with another account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareMethod {
    /// Shared within an AWS Organization; no acceptance needed.
    Organizations,
    /// Shared by invitation; the consumer must accept.
    #[default]
    Handshake,
}

/// A directory as described by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryDescription {
    pub directory_id: String,
    pub stage: String,
    #[serde(default)]
    pub stage_reason: Option<String>,
}

/// A directory shared from an owner account into a consumer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedDirectory {
    pub owner_account_id: String,
    pub owner_directory_id: String,
    pub shared_account_id: String,
    pub shared_directory_id: String,
    pub share_method: ShareMethod,
    pub share_status: String,
    #[serde(default)]
    pub share_notes: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub last_updated_date_time: Option<String>,
}

/// The account a directory is shared with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareTarget {
    pub id: String,
    #[serde(rename = "type", default = "default_target_type")]
    pub target_type: String,
}

fn default_target_type() -> String {
    "ACCOUNT".to_string()
}

/// Request to share a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareDirectoryInput {
    pub directory_id: String,
    pub share_method: ShareMethod,
    pub share_notes: Option<String>,
    pub share_target: ShareTarget,
}

/// Request to stop sharing a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnshareDirectoryInput {
    pub directory_id: String,
    pub unshare_target: ShareTarget,
}

/// The Directory Service calls used by this module.
#[async_trait]
pub trait DirectoryServiceApi: Send + Sync {
    /// Describe directories by id. Unknown ids fail with [`ERR_ENTITY_DOES_NOT_EXIST`].
    async fn describe_directories(
        &self,
        directory_ids: &[String],
    ) -> Result<Vec<DirectoryDescription>, ProviderError>;

    /// Describe directories shared from `owner_directory_id`.
    async fn describe_shared_directories(
        &self,
        owner_directory_id: &str,
        shared_directory_ids: &[String],
    ) -> Result<Vec<SharedDirectory>, ProviderError>;

    /// Share a directory, returning the shared directory id.
    async fn share_directory(&self, input: &ShareDirectoryInput) -> Result<String, ProviderError>;

    /// Stop sharing a directory.
    async fn unshare_directory(&self, input: &UnshareDirectoryInput) -> Result<(), ProviderError>;

    /// Accept a handshake share in the consumer account.
    async fn accept_shared_directory(
        &self,
        shared_directory_id: &str,
    ) -> Result<SharedDirectory, ProviderError>;
}

// =========================================================================
// Finders
// =========================================================================

/// Find a directory; `None` when it does not exist or has been deleted.
pub async fn find_directory_by_id(
    api: &dyn DirectoryServiceApi,
    id: &str,
) -> Result<Option<DirectoryDescription>, ProviderError> {
    let output = match api.describe_directories(&[id.to_string()]).await {
        Err(err) if err.is_code(ERR_ENTITY_DOES_NOT_EXIST) => return Ok(None),
        other => other?,
    };

    Ok(output
        .into_iter()
        .next()
        .filter(|directory| directory.stage != stage::DELETED))
}

/// Find a shared directory; `None` when the owner no longer shares it.
///
/// More than one match is an error.
pub async fn find_shared_directory(
    api: &dyn DirectoryServiceApi,
    owner_directory_id: &str,
    shared_directory_id: &str,
) -> Result<Option<SharedDirectory>, ProviderError> {
    let mut output = api
        .describe_shared_directories(owner_directory_id, &[shared_directory_id.to_string()])
        .await?;

    if output.len() > 1 {
        return Err(ProviderError::FailedPrecondition(format!(
            "got more than one shared directory with the shared id: {} and directory id: {}",
            shared_directory_id, owner_directory_id
        )));
    }
    Ok(output.pop())
}

// =========================================================================
// Status functions
// =========================================================================

/// Current stage of a directory, with its stage reason.
pub async fn directory_stage(
    api: &dyn DirectoryServiceApi,
    id: &str,
) -> Result<Poll<DirectoryDescription>, ProviderError> {
    Ok(match find_directory_by_id(api, id).await? {
        Some(directory) => {
            let stage = directory.stage.clone();
            let reason = directory.stage_reason.clone().unwrap_or_default();
            Poll::found(directory, stage).with_reason(reason)
        },
        None => Poll::gone(),
    })
}

/// Current share status of a shared directory.
pub async fn share_directory_status(
    api: &dyn DirectoryServiceApi,
    owner_directory_id: &str,
    shared_directory_id: &str,
) -> Result<Poll<SharedDirectory>, ProviderError> {
    Ok(
        match find_shared_directory(api, owner_directory_id, shared_directory_id).await? {
            Some(shared) => {
                let status = shared.share_status.clone();
                Poll::found(shared, status)
            },
            None => Poll::gone(),
        },
    )
}

// =========================================================================
// Waiters
// =========================================================================

/// Wait for a new directory to become active.
pub async fn directory_created(
    api: &dyn DirectoryServiceApi,
    id: &str,
    timeout: Duration,
    polling: &WaiterConfig,
) -> Result<DirectoryDescription, WaitFailure<DirectoryDescription>> {
    let spec = polling
        .apply(WaitSpec::builder(timeout))
        .pending([stage::REQUESTED, stage::CREATING, stage::CREATED])
        .target([stage::ACTIVE])
        .fatal([stage::FAILED])
        .build()
        .map_err(WaitFailure::new)?;

    wait_found(&spec, move || directory_stage(api, id)).await
}

/// Wait for a directory to be deleted.
pub async fn directory_deleted(
    api: &dyn DirectoryServiceApi,
    id: &str,
    timeout: Duration,
    polling: &WaiterConfig,
) -> Result<(), WaitFailure<DirectoryDescription>> {
    let spec = polling
        .apply(WaitSpec::builder(timeout))
        .pending([stage::ACTIVE, stage::DELETING])
        .target([stage::DELETED])
        .not_found(NotFoundPolicy::Sentinel(stage::DELETED.to_string()))
        .build()
        .map_err(WaitFailure::new)?;

    wait(&spec, move || directory_stage(api, id)).await.map(drop)
}

/// Wait for an organizations share to settle.
///
/// `ShareFailed` is a target: the share exists and its status is surfaced
/// to the caller through state.
pub async fn share_directory_shared(
    api: &dyn DirectoryServiceApi,
    owner_directory_id: &str,
    shared_directory_id: &str,
    timeout: Duration,
    polling: &WaiterConfig,
) -> Result<SharedDirectory, WaitFailure<SharedDirectory>> {
    let spec = polling
        .apply(WaitSpec::builder(timeout))
        .pending([share_status::SHARING])
        .target([share_status::SHARED, share_status::SHARE_FAILED])
        .not_found(NotFoundPolicy::RetryAtMost(SHARE_NOT_FOUND_CHECKS))
        .build()
        .map_err(WaitFailure::new)?;

    wait_found(&spec, move || {
        share_directory_status(api, owner_directory_id, shared_directory_id)
    })
    .await
}

/// Wait for a handshake share to await acceptance by the consumer.
pub async fn share_directory_pending_acceptance(
    api: &dyn DirectoryServiceApi,
    owner_directory_id: &str,
    shared_directory_id: &str,
    timeout: Duration,
    polling: &WaiterConfig,
) -> Result<SharedDirectory, WaitFailure<SharedDirectory>> {
    let spec = polling
        .apply(WaitSpec::builder(timeout))
        .pending([share_status::SHARING])
        .target([share_status::PENDING_ACCEPTANCE, share_status::SHARED])
        .fatal([share_status::SHARE_FAILED])
        .not_found(NotFoundPolicy::RetryAtMost(SHARE_NOT_FOUND_CHECKS))
        .build()
        .map_err(WaitFailure::new)?;

    wait_found(&spec, move || {
        share_directory_status(api, owner_directory_id, shared_directory_id)
    })
    .await
}

/// Wait for an unshared directory to disappear.
pub async fn share_directory_deleted(
    api: &dyn DirectoryServiceApi,
    owner_directory_id: &str,
    shared_directory_id: &str,
    timeout: Duration,
    polling: &WaiterConfig,
) -> Result<(), WaitFailure<SharedDirectory>> {
    let spec = polling
        .apply(WaitSpec::builder(timeout))
        .pending([share_status::DELETING])
        .target([share_status::DELETED])
        .not_found(NotFoundPolicy::Sentinel(share_status::DELETED.to_string()))
        .build()
        .map_err(WaitFailure::new)?;

    wait(&spec, move || {
        share_directory_status(api, owner_directory_id, shared_directory_id)
    })
    .await
    .map(drop)
}

// =========================================================================
// Share directory lifecycle
// =========================================================================

/// Configuration of a directory share.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShareDirectoryConfig {
    pub directory_id: String,
    #[serde(default)]
    pub share_method: ShareMethod,
    #[serde(default)]
    pub share_notes: Option<String>,
    pub share_target: ShareTarget,
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// State recorded for a directory share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareDirectoryState {
    /// `DIRECTORY-ID/SHARED-DIRECTORY-ID`.
    pub id: String,
    pub directory_id: String,
    pub shared_directory_id: String,
    pub shared_account_id: String,
    pub share_method: ShareMethod,
    pub share_status: String,
    pub share_notes: Option<String>,
    pub created_date_time: Option<String>,
    pub last_updated_date_time: Option<String>,
}

impl ShareDirectoryState {
    fn from_shared(directory_id: &str, shared: SharedDirectory) -> Self {
        Self {
            id: share_directory_id(directory_id, &shared.shared_directory_id),
            directory_id: directory_id.to_string(),
            shared_directory_id: shared.shared_directory_id,
            shared_account_id: shared.shared_account_id,
            share_method: shared.share_method,
            share_status: shared.share_status,
            share_notes: shared.share_notes,
            created_date_time: shared.created_date_time,
            last_updated_date_time: shared.last_updated_date_time,
        }
    }
}

/// Compose a share's resource id.
pub fn share_directory_id(directory_id: &str, shared_directory_id: &str) -> String {
    format!("{}/{}", directory_id, shared_directory_id)
}

/// Split a share's resource id (also the import id) into its parts.
pub fn parse_share_directory_id(id: &str) -> Result<(String, String), ProviderError> {
    match id.split('/').collect::<Vec<_>>().as_slice() {
        [directory_id, shared_directory_id]
            if !directory_id.is_empty() && !shared_directory_id.is_empty() =>
        {
            Ok((directory_id.to_string(), shared_directory_id.to_string()))
        },
        _ => Err(ProviderError::InvalidRequest(format!(
            "expected ID in the form of DIRECTORY-ID/SHARED-DIRECTORY-ID, given: {:?}",
            id
        ))),
    }
}

/// Share a directory and wait until the share settles.
#[instrument(skip(api, config, polling), fields(directory_id = %config.directory_id))]
pub async fn create_share_directory(
    api: &dyn DirectoryServiceApi,
    config: &ShareDirectoryConfig,
    polling: &WaiterConfig,
) -> Result<ShareDirectoryState, ProviderError> {
    let input = ShareDirectoryInput {
        directory_id: config.directory_id.clone(),
        share_method: config.share_method,
        share_notes: config.share_notes.clone(),
        share_target: config.share_target.clone(),
    };
    let timeout = config
        .timeouts
        .create_or(SHARE_DIRECTORY_OPERATION_TIMEOUT);

    let input = &input;
    let shared_directory_id = retry(RetryPolicy::new(timeout), move || async move {
        api.share_directory(input)
            .await
            .map_err(|e| RetryError::on_code(e, ERR_DIRECTORY_DOES_NOT_EXIST))
    })
    .await?;

    let id = share_directory_id(&config.directory_id, &shared_directory_id);
    let shared = match config.share_method {
        ShareMethod::Organizations => share_directory_shared(
            api,
            &config.directory_id,
            &shared_directory_id,
            timeout,
            polling,
        )
        .await
        .map_err(|f| f.context(format!("Directory Service Share Directory ({}) to be shared", id)))?,
        ShareMethod::Handshake => share_directory_pending_acceptance(
            api,
            &config.directory_id,
            &shared_directory_id,
            timeout,
            polling,
        )
        .await
        .map_err(|f| {
            f.context(format!(
                "Directory Service Share Directory ({}) to be pending acceptance",
                id
            ))
        })?,
    };

    info!(id = %id, status = %shared.share_status, "directory shared");
    Ok(ShareDirectoryState::from_shared(&config.directory_id, shared))
}

/// Read a directory share; `None` when it no longer exists.
#[instrument(skip(api))]
pub async fn read_share_directory(
    api: &dyn DirectoryServiceApi,
    id: &str,
) -> Result<Option<ShareDirectoryState>, ProviderError> {
    let (directory_id, shared_directory_id) = parse_share_directory_id(id)?;

    match find_shared_directory(api, &directory_id, &shared_directory_id).await {
        Ok(Some(shared)) => Ok(Some(ShareDirectoryState::from_shared(&directory_id, shared))),
        Ok(None) => {
            warn!(id = %id, "Directory Service Share Directory not found, removing from state");
            Ok(None)
        },
        Err(err)
            if err.is_code(ERR_ENTITY_DOES_NOT_EXIST) || err.is_code(ERR_DIRECTORY_NOT_SHARED) =>
        {
            warn!(id = %id, "Directory Service Share Directory not found, removing from state");
            Ok(None)
        },
        Err(err) => Err(err),
    }
}

/// Stop sharing a directory and wait until the share is gone.
///
/// A share that is already gone counts as deleted.
#[instrument(skip(api, config, polling))]
pub async fn delete_share_directory(
    api: &dyn DirectoryServiceApi,
    id: &str,
    config: &ShareDirectoryConfig,
    polling: &WaiterConfig,
) -> Result<(), ProviderError> {
    let (directory_id, shared_directory_id) = parse_share_directory_id(id)?;
    let input = UnshareDirectoryInput {
        directory_id: directory_id.clone(),
        unshare_target: config.share_target.clone(),
    };

    match api.unshare_directory(&input).await {
        Err(err)
            if err.is_code(ERR_ENTITY_DOES_NOT_EXIST) || err.is_code(ERR_DIRECTORY_NOT_SHARED) =>
        {
            return Ok(());
        },
        other => other?,
    }

    let timeout = config.timeouts.delete_or(SHARE_DIRECTORY_DELETED_TIMEOUT);
    share_directory_deleted(api, &directory_id, &shared_directory_id, timeout, polling)
        .await
        .map_err(|f| f.context(format!("Directory Service Share Directory ({}) to be deleted", id)))
}

/// Import a directory share by `DIRECTORY-ID/SHARED-DIRECTORY-ID`.
pub async fn import_share_directory(
    api: &dyn DirectoryServiceApi,
    id: &str,
) -> Result<ShareDirectoryState, ProviderError> {
    read_share_directory(api, id)
        .await?
        .ok_or_else(|| ProviderError::NotFound(format!("Directory Service Share Directory ({})", id)))
}

/// Accept a handshake share in the consumer account.
///
/// Retries while the shared directory is not yet visible to the consumer.
#[instrument(skip(api))]
pub async fn accept_shared_directory(
    api: &dyn DirectoryServiceApi,
    shared_directory_id: &str,
    timeout: Duration,
) -> Result<SharedDirectory, ProviderError> {
    retry(RetryPolicy::new(timeout), move || async move {
        api.accept_shared_directory(shared_directory_id)
            .await
            .map_err(|e| RetryError::on_code(e, ERR_DIRECTORY_DOES_NOT_EXIST))
    })
    .await
}
