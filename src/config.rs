//! Configuration for waits: per-resource timeouts and provider polling defaults.
//!
//! Resources accept a `timeouts` block overriding how long lifecycle
//! operations wait:
//!
//! ```
//! use std::time::Duration;
//! use hemmer_provider_waiter::config::Timeouts;
//!
//! let timeouts: Timeouts = serde_json::from_value(serde_json::json!({
//!     "create": "90m",
//!     "delete": "1h30m"
//! }))
//! .unwrap();
//!
//! assert_eq!(timeouts.create_or(Duration::from_secs(60)), Duration::from_secs(90 * 60));
//! assert_eq!(timeouts.update_or(Duration::from_secs(60)), Duration::from_secs(60));
//! ```

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::ProviderError;
use crate::waiter::{WaitSpecBuilder, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY};

/// Per-operation timeout overrides from a resource's `timeouts` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timeouts {
    /// Create timeout.
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub create: Option<Duration>,
    /// Update timeout.
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub update: Option<Duration>,
    /// Delete timeout.
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub delete: Option<Duration>,
}

impl Timeouts {
    /// Create timeout, or `default` when not overridden.
    pub fn create_or(&self, default: Duration) -> Duration {
        self.create.unwrap_or(default)
    }

    /// Update timeout, or `default` when not overridden.
    pub fn update_or(&self, default: Duration) -> Duration {
        self.update.unwrap_or(default)
    }

    /// Delete timeout, or `default` when not overridden.
    pub fn delete_or(&self, default: Duration) -> Duration {
        self.delete.unwrap_or(default)
    }
}

/// Provider-level polling defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WaiterConfig {
    /// First interval between polls.
    #[serde(deserialize_with = "deserialize_duration")]
    pub min_delay: Duration,
    /// Longest interval between polls.
    #[serde(deserialize_with = "deserialize_duration")]
    pub max_delay: Duration,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl WaiterConfig {
    /// Parse polling defaults from provider configuration.
    ///
    /// A `null` value yields the defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_value(value)
            .map_err(|e| ProviderError::Configuration(format!("invalid waiter config: {}", e)))?;
        if config.min_delay.is_zero() {
            return Err(ProviderError::Configuration(
                "min_delay must be greater than zero".to_string(),
            ));
        }
        if config.min_delay > config.max_delay {
            return Err(ProviderError::Configuration(format!(
                "min_delay ({:?}) must not exceed max_delay ({:?})",
                config.min_delay, config.max_delay
            )));
        }
        Ok(config)
    }

    /// Apply these polling bounds to a wait.
    pub fn apply(&self, builder: WaitSpecBuilder) -> WaitSpecBuilder {
        builder.delays(self.min_delay, self.max_delay)
    }
}

/// Parse a duration such as `"500ms"`, `"90s"`, `"4m"` or `"1h30m"`.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in duration {:?}", input))?;
        if digits == 0 {
            return Err(format!("invalid duration {:?}", input));
        }
        let amount: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid duration {:?}", input))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "ms" => Duration::from_millis(1),
            "s" => Duration::from_secs(1),
            "m" => Duration::from_secs(60),
            "h" => Duration::from_secs(3600),
            other => return Err(format!("unknown unit {:?} in duration {:?}", other, input)),
        };
        rest = &rest[unit_len..];

        let part = u32::try_from(amount)
            .ok()
            .and_then(|n| unit.checked_mul(n))
            .ok_or_else(|| format!("duration {:?} overflows", input))?;
        total = total
            .checked_add(part)
            .ok_or_else(|| format!("duration {:?} overflows", input))?;
    }
    Ok(total)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
        .transpose()
}
