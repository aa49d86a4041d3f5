//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! interceptor chains. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};

use crate::redact::MessageSchema;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Demo server settings.
    pub server: ServerConfig,

    /// Retry policy for outbound unary calls.
    pub retry: RetryConfig,

    /// HTTP request classification.
    pub classifier: ClassifierConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Message schemas carrying loggable annotations.
    pub schemas: Vec<MessageSchema>,
}

/// Demo server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Fraction of the delay added as random jitter (0.0 disables jitter).
    pub jitter_ratio: f64,

    /// Status code names that are retried.
    pub retryable_codes: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            jitter_ratio: 0.0,
            retryable_codes: vec!["ABORTED".to_string(), "UNAVAILABLE".to_string()],
        }
    }
}

/// Request classifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Known resource-type tokens, lower-case.
    pub resource_types: Vec<String>,

    /// Path segments that mark a hierarchical resource path.
    pub hierarchical_markers: Vec<String>,

    /// Last segment of a subscription life-cycle notification.
    pub lifecycle_marker: String,

    /// Prefix of an action segment on generic REST paths.
    pub action_prefix: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let resource_types = [
            "subscriptions",
            "resourcegroups",
            "deployments",
            "storageaccounts",
            "virtualmachines",
            "virtualmachinescalesets",
            "disks",
            "snapshots",
            "managedclusters",
            "agentpools",
            "virtualnetworks",
            "subnets",
            "networkinterfaces",
            "networksecuritygroups",
            "publicipaddresses",
            "loadbalancers",
            "privateendpoints",
            "vaults",
            "registries",
            "userassignedidentities",
            "roleassignments",
            "roledefinitions",
        ];
        Self {
            resource_types: resource_types.iter().map(|s| s.to_string()).collect(),
            hierarchical_markers: vec!["subscriptions".to_string(), "providers".to_string()],
            lifecycle_marker: "lifecycleNotifications".to_string(),
            action_prefix: "action-".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
