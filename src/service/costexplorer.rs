//! Cost Explorer: anomaly monitors, anomaly subscriptions and cost categories.
//!
//! Creation calls reference other resources (monitors, SNS topics) that may
//! not be visible to Cost Explorer yet, so each is retried while the service
//! answers `ResourceNotFoundException`. Reads report a missing resource as
//! `None` and deletes of a missing resource succeed.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::ProviderError;
use crate::retry::{retry, RetryError, RetryPolicy};

/// Time allowed for a cost category definition to become consistent.
pub const COST_CATEGORY_DEFINITION_OPERATION_TIMEOUT: Duration = Duration::from_secs(4 * 60);
/// Time allowed for an anomaly monitor to become consistent.
pub const ANOMALY_MONITOR_OPERATION_TIMEOUT: Duration = Duration::from_secs(4 * 60);
/// Time allowed for an anomaly subscription to become consistent.
pub const ANOMALY_SUBSCRIPTION_OPERATION_TIMEOUT: Duration = Duration::from_secs(4 * 60);

/// Error code for a referenced resource that is not visible.
pub const ERR_RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
/// Error code Cost Explorer uses for some unknown subscriptions.
pub const ERR_UNKNOWN_SUBSCRIPTION: &str = "UnknownSubscriptionException";

/// How a monitor groups spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorType {
    Dimensional,
    Custom,
}

/// Request to create an anomaly monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyMonitorInput {
    pub monitor_name: String,
    pub monitor_type: MonitorType,
    /// Required for dimensional monitors, e.g. `SERVICE`.
    #[serde(default)]
    pub monitor_dimension: Option<String>,
    /// Cost Explorer expression, JSON encoded; custom monitors only.
    #[serde(default)]
    pub monitor_specification: Option<String>,
}

impl AnomalyMonitorInput {
    /// Check the fields required by the monitor type.
    pub fn validate(&self) -> Result<(), ProviderError> {
        match (self.monitor_type, &self.monitor_dimension, &self.monitor_specification) {
            (MonitorType::Dimensional, None, _) => Err(ProviderError::Validation(
                "monitor_dimension is required for DIMENSIONAL monitors".to_string(),
            )),
            (MonitorType::Custom, _, None) => Err(ProviderError::Validation(
                "monitor_specification is required for CUSTOM monitors".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Where anomaly alerts are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub address: String,
    /// `EMAIL` or `SNS`.
    #[serde(rename = "type")]
    pub subscriber_type: String,
}

/// Request to create an anomaly subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySubscriptionInput {
    pub subscription_name: String,
    pub monitor_arn_list: Vec<String>,
    pub subscribers: Vec<Subscriber>,
    /// `DAILY`, `IMMEDIATE` or `WEEKLY`.
    pub frequency: String,
    pub threshold: f64,
}

/// A cost category rule, mapping matching costs to a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCategoryRule {
    pub value: String,
    /// Cost Explorer expression, JSON encoded.
    pub rule: String,
}

/// Request to create a cost category definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCategoryInput {
    pub name: String,
    #[serde(default = "default_rule_version")]
    pub rule_version: String,
    pub rules: Vec<CostCategoryRule>,
    #[serde(default)]
    pub default_value: Option<String>,
}

fn default_rule_version() -> String {
    "CostCategoryExpression.v1".to_string()
}

/// An anomaly monitor as described by Cost Explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyMonitor {
    pub monitor_arn: String,
    pub monitor_name: String,
    pub monitor_type: MonitorType,
    #[serde(default)]
    pub monitor_dimension: Option<String>,
    #[serde(default)]
    pub monitor_specification: Option<String>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub last_updated_date: Option<String>,
    #[serde(default)]
    pub last_evaluated_date: Option<String>,
    #[serde(default)]
    pub dimensional_value_count: i64,
}

/// An anomaly subscription as described by Cost Explorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySubscription {
    pub subscription_arn: String,
    #[serde(default)]
    pub account_id: Option<String>,
    pub subscription_name: String,
    pub monitor_arn_list: Vec<String>,
    pub subscribers: Vec<Subscriber>,
    pub frequency: String,
    pub threshold: f64,
}

/// Request to change an anomaly subscription in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateAnomalySubscriptionInput {
    pub subscription_arn: String,
    pub subscription_name: String,
    pub monitor_arn_list: Vec<String>,
    pub subscribers: Vec<Subscriber>,
    pub frequency: String,
    pub threshold: f64,
}

/// A cost category definition as described by Cost Explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCategory {
    pub cost_category_arn: String,
    pub name: String,
    pub rule_version: String,
    pub rules: Vec<CostCategoryRule>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub effective_start: Option<String>,
    #[serde(default)]
    pub effective_end: Option<String>,
}

/// The Cost Explorer calls used by this module. Create calls return the new
/// ARN.
#[async_trait]
pub trait CostExplorerApi: Send + Sync {
    /// Create an anomaly monitor.
    async fn create_anomaly_monitor(&self, input: &AnomalyMonitorInput) -> Result<String, ProviderError>;

    /// Create an anomaly subscription.
    async fn create_anomaly_subscription(
        &self,
        input: &AnomalySubscriptionInput,
    ) -> Result<String, ProviderError>;

    /// Create a cost category definition.
    async fn create_cost_category_definition(
        &self,
        input: &CostCategoryInput,
    ) -> Result<String, ProviderError>;

    /// Describe anomaly monitors by ARN.
    async fn get_anomaly_monitors(
        &self,
        arns: &[String],
    ) -> Result<Vec<AnomalyMonitor>, ProviderError>;

    /// Rename an anomaly monitor, the only mutable monitor field.
    async fn update_anomaly_monitor(&self, arn: &str, monitor_name: &str)
        -> Result<(), ProviderError>;

    /// Delete an anomaly monitor.
    async fn delete_anomaly_monitor(&self, arn: &str) -> Result<(), ProviderError>;

    /// Describe anomaly subscriptions by ARN.
    async fn get_anomaly_subscriptions(
        &self,
        arns: &[String],
    ) -> Result<Vec<AnomalySubscription>, ProviderError>;

    /// Change an anomaly subscription.
    async fn update_anomaly_subscription(
        &self,
        input: &UpdateAnomalySubscriptionInput,
    ) -> Result<(), ProviderError>;

    /// Delete an anomaly subscription.
    async fn delete_anomaly_subscription(&self, arn: &str) -> Result<(), ProviderError>;

    /// Describe a cost category definition.
    async fn describe_cost_category_definition(
        &self,
        arn: &str,
    ) -> Result<CostCategory, ProviderError>;

    /// Replace the rules of a cost category definition.
    async fn update_cost_category_definition(
        &self,
        arn: &str,
        input: &CostCategoryInput,
    ) -> Result<(), ProviderError>;

    /// Delete a cost category definition.
    async fn delete_cost_category_definition(&self, arn: &str) -> Result<(), ProviderError>;
}

/// Whether an error means the subscription does not exist.
///
/// Cost Explorer answers some lookups of deleted subscriptions with
/// `UnknownSubscriptionException` instead of `ResourceNotFoundException`.
fn is_subscription_gone(err: &ProviderError) -> bool {
    err.is_code(ERR_RESOURCE_NOT_FOUND)
        || (err.is_code(ERR_UNKNOWN_SUBSCRIPTION)
            && err.message().contains("No anomaly subscription"))
}

/// Create an anomaly monitor, returning its ARN.
#[instrument(skip(api, input), fields(name = %input.monitor_name))]
pub async fn create_anomaly_monitor(
    api: &dyn CostExplorerApi,
    input: &AnomalyMonitorInput,
) -> Result<String, ProviderError> {
    input.validate()?;

    let arn = retry(RetryPolicy::new(ANOMALY_MONITOR_OPERATION_TIMEOUT), move || async move {
        api.create_anomaly_monitor(input)
            .await
            .map_err(|e| RetryError::on_code(e, ERR_RESOURCE_NOT_FOUND))
    })
    .await?;

    info!(arn = %arn, "anomaly monitor created");
    Ok(arn)
}

/// Create an anomaly subscription, returning its ARN.
///
/// Retries while the monitors or SNS topics it references propagate.
#[instrument(skip(api, input), fields(name = %input.subscription_name))]
pub async fn create_anomaly_subscription(
    api: &dyn CostExplorerApi,
    input: &AnomalySubscriptionInput,
) -> Result<String, ProviderError> {
    if input.monitor_arn_list.is_empty() {
        return Err(ProviderError::Validation(
            "monitor_arn_list must name at least one monitor".to_string(),
        ));
    }

    let arn = retry(
        RetryPolicy::new(ANOMALY_SUBSCRIPTION_OPERATION_TIMEOUT),
        move || async move {
            api.create_anomaly_subscription(input)
                .await
                .map_err(|e| RetryError::on_code(e, ERR_RESOURCE_NOT_FOUND))
        },
    )
    .await?;

    info!(arn = %arn, "anomaly subscription created");
    Ok(arn)
}

/// Create a cost category definition, returning its ARN.
#[instrument(skip(api, input), fields(name = %input.name))]
pub async fn create_cost_category(
    api: &dyn CostExplorerApi,
    input: &CostCategoryInput,
) -> Result<String, ProviderError> {
    let arn = retry(
        RetryPolicy::new(COST_CATEGORY_DEFINITION_OPERATION_TIMEOUT),
        move || async move {
            api.create_cost_category_definition(input)
                .await
                .map_err(|e| RetryError::on_code(e, ERR_RESOURCE_NOT_FOUND))
        },
    )
    .await?;

    info!(arn = %arn, "cost category created");
    Ok(arn)
}

// =========================================================================
// Anomaly monitor
// =========================================================================

/// Read an anomaly monitor; `None` when it no longer exists.
#[instrument(skip(api))]
pub async fn read_anomaly_monitor(
    api: &dyn CostExplorerApi,
    arn: &str,
) -> Result<Option<AnomalyMonitor>, ProviderError> {
    let found = match api.get_anomaly_monitors(&[arn.to_string()]).await {
        Ok(monitors) => monitors.into_iter().find(|m| m.monitor_arn == arn),
        Err(err) if err.is_code(ERR_RESOURCE_NOT_FOUND) => None,
        Err(err) => return Err(err),
    };

    if found.is_none() {
        warn!(arn = %arn, "CE Anomaly Monitor not found, removing from state");
    }
    Ok(found)
}

/// Rename an anomaly monitor and return its new description.
#[instrument(skip(api))]
pub async fn update_anomaly_monitor(
    api: &dyn CostExplorerApi,
    arn: &str,
    monitor_name: &str,
) -> Result<AnomalyMonitor, ProviderError> {
    api.update_anomaly_monitor(arn, monitor_name).await?;

    read_anomaly_monitor(api, arn)
        .await?
        .ok_or_else(|| ProviderError::NotFound(format!("CE Anomaly Monitor ({})", arn)))
}

/// Delete an anomaly monitor. A missing monitor counts as deleted.
#[instrument(skip(api))]
pub async fn delete_anomaly_monitor(
    api: &dyn CostExplorerApi,
    arn: &str,
) -> Result<(), ProviderError> {
    match api.delete_anomaly_monitor(arn).await {
        Err(err) if err.is_code(ERR_RESOURCE_NOT_FOUND) => Ok(()),
        other => other,
    }
}

// =========================================================================
// Anomaly subscription
// =========================================================================

/// Read an anomaly subscription; `None` when it no longer exists.
#[instrument(skip(api))]
pub async fn read_anomaly_subscription(
    api: &dyn CostExplorerApi,
    arn: &str,
) -> Result<Option<AnomalySubscription>, ProviderError> {
    let found = match api.get_anomaly_subscriptions(&[arn.to_string()]).await {
        Ok(subscriptions) => subscriptions.into_iter().find(|s| s.subscription_arn == arn),
        Err(err) if is_subscription_gone(&err) => None,
        Err(err) => return Err(err),
    };

    if found.is_none() {
        warn!(arn = %arn, "CE Anomaly Subscription not found, removing from state");
    }
    Ok(found)
}

/// Apply `input` to an existing subscription and return its new description.
#[instrument(skip(api, input), fields(name = %input.subscription_name))]
pub async fn update_anomaly_subscription(
    api: &dyn CostExplorerApi,
    arn: &str,
    input: &AnomalySubscriptionInput,
) -> Result<AnomalySubscription, ProviderError> {
    if input.monitor_arn_list.is_empty() {
        return Err(ProviderError::Validation(
            "monitor_arn_list must name at least one monitor".to_string(),
        ));
    }

    let update = UpdateAnomalySubscriptionInput {
        subscription_arn: arn.to_string(),
        subscription_name: input.subscription_name.clone(),
        monitor_arn_list: input.monitor_arn_list.clone(),
        subscribers: input.subscribers.clone(),
        frequency: input.frequency.clone(),
        threshold: input.threshold,
    };
    api.update_anomaly_subscription(&update).await?;

    read_anomaly_subscription(api, arn)
        .await?
        .ok_or_else(|| ProviderError::NotFound(format!("CE Anomaly Subscription ({})", arn)))
}

/// Delete an anomaly subscription. A missing subscription counts as deleted.
#[instrument(skip(api))]
pub async fn delete_anomaly_subscription(
    api: &dyn CostExplorerApi,
    arn: &str,
) -> Result<(), ProviderError> {
    match api.delete_anomaly_subscription(arn).await {
        Err(err) if is_subscription_gone(&err) => Ok(()),
        other => other,
    }
}

// =========================================================================
// Cost category
// =========================================================================

/// Read a cost category definition; `None` when it no longer exists.
#[instrument(skip(api))]
pub async fn read_cost_category(
    api: &dyn CostExplorerApi,
    arn: &str,
) -> Result<Option<CostCategory>, ProviderError> {
    match api.describe_cost_category_definition(arn).await {
        Ok(category) => Ok(Some(category)),
        Err(err) if err.is_code(ERR_RESOURCE_NOT_FOUND) => {
            warn!(arn = %arn, "CE Cost Category Definition not found, removing from state");
            Ok(None)
        },
        Err(err) => Err(err),
    }
}

/// Replace a cost category's rules and return its new description.
#[instrument(skip(api, input), fields(name = %input.name))]
pub async fn update_cost_category(
    api: &dyn CostExplorerApi,
    arn: &str,
    input: &CostCategoryInput,
) -> Result<CostCategory, ProviderError> {
    api.update_cost_category_definition(arn, input).await?;

    read_cost_category(api, arn)
        .await?
        .ok_or_else(|| ProviderError::NotFound(format!("CE Cost Category Definition ({})", arn)))
}

/// Delete a cost category definition. A missing definition counts as
/// deleted.
#[instrument(skip(api))]
pub async fn delete_cost_category(
    api: &dyn CostExplorerApi,
    arn: &str,
) -> Result<(), ProviderError> {
    match api.delete_cost_category_definition(arn).await {
        Err(err) if err.is_code(ERR_RESOURCE_NOT_FOUND) => Ok(()),
        other => other,
    }
}
