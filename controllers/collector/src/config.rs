//! Controller configuration.
//!
//! Everything is read from environment variables at startup. The synthesizer
//! never reads the environment itself: it is handed a [`ConfigProvider`].

use crate::error::ControllerError;
#[cfg(test)]
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

/// Key under which the default collector image is looked up
pub const IMAGE_CONFIG_KEY: &str = "otelsvc-image";

const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Key/value store for ambient settings such as the default image.
pub trait ConfigProvider: Send + Sync {
    /// Value for `key`, or an empty string when unset
    fn get_string(&self, key: &str) -> String;
}

/// Reads keys from the process environment.
///
/// `otelsvc-image` is read from `OTELSVC_IMAGE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfigProvider;

/// Environment variable backing a configuration key
pub fn env_key(key: &str) -> String {
    key.to_ascii_uppercase().replace(['-', '.'], "_")
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> String {
        env::var(env_key(key)).unwrap_or_default()
    }
}

/// Fixed, map-backed configuration.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    values: BTreeMap<String, String>,
}

#[cfg(test)]
impl StaticConfigProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
impl ConfigProvider for StaticConfigProvider {
    fn get_string(&self, key: &str) -> String {
        self.values.get(key).cloned().unwrap_or_default()
    }
}

/// What to do when an existing Deployment differs from the desired one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriftPolicy {
    /// Log the drift and leave the Deployment alone
    #[default]
    Observe,
    /// Replace the Deployment, carrying its resourceVersion forward
    Replace,
}

impl std::str::FromStr for DriftPolicy {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "observe" => Ok(DriftPolicy::Observe),
            "replace" => Ok(DriftPolicy::Replace),
            other => Err(ControllerError::InvalidConfig(format!(
                "COLLECTOR_DRIFT_POLICY must be 'observe' or 'replace', got '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for DriftPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftPolicy::Observe => write!(f, "observe"),
            DriftPolicy::Replace => write!(f, "replace"),
        }
    }
}

/// Startup configuration of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch (`None` watches all namespaces)
    pub namespace: Option<String>,
    /// Found-path behaviour
    pub drift_policy: DriftPolicy,
    /// Deadline for each Kubernetes API call
    pub api_timeout: Duration,
}

impl ControllerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps variable names to values
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let drift_policy = match lookup("COLLECTOR_DRIFT_POLICY") {
            Some(value) => value.parse()?,
            None => DriftPolicy::default(),
        };

        let api_timeout = match lookup("CLUSTER_API_TIMEOUT_SECS") {
            Some(value) => {
                let secs = value.trim().parse::<u64>().map_err(|e| {
                    ControllerError::InvalidConfig(format!(
                        "CLUSTER_API_TIMEOUT_SECS must be a number of seconds, got '{}': {}",
                        value, e
                    ))
                })?;
                if secs == 0 {
                    return Err(ControllerError::InvalidConfig(
                        "CLUSTER_API_TIMEOUT_SECS must be greater than zero".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
        };

        Ok(Self {
            namespace,
            drift_policy,
            api_timeout,
        })
    }
}
