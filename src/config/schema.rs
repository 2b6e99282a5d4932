//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the pipeline.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the filter pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Last-serviced request tracking.
    pub isolation: IsolationConfig,

    /// Privileged execution of filters and servlets.
    pub security: SecurityConfig,

    /// Filter chain pooling.
    pub pool: PoolConfig,

    /// Filter definitions.
    pub filters: Vec<FilterDefConfig>,

    /// Filter mappings, in evaluation order.
    pub filter_mappings: Vec<FilterMappingConfig>,

    /// Servlet definitions, in URL-mapping order.
    pub servlets: Vec<ServletConfig>,

    /// Servlet used when no servlet URL pattern matches.
    pub default_servlet: Option<String>,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size read into a servlet request.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Worker-local tracking of the request/response handed to the servlet.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IsolationConfig {
    /// Record the last serviced request/response while the servlet runs.
    /// When disabled the accessors always report nothing.
    pub track_last_serviced: bool,
}

/// Security configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// Run filters and servlets through the privileged executor.
    /// Chains are never pooled while this is enabled.
    pub privileged_execution: bool,
}

/// Filter chain pool configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum idle chains kept per servlet. Zero disables pooling.
    pub max_idle_per_servlet: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_servlet: 64,
        }
    }
}

/// Filter definition.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FilterDefConfig {
    /// Unique filter name referenced by mappings.
    pub name: String,

    /// Implementation class registered with the component factory.
    pub class: String,

    /// Async support: `true`, `false`, or absent to inherit.
    #[serde(default)]
    pub async_supported: Option<bool>,

    /// Parameters passed to the filter on initialisation.
    #[serde(default)]
    pub init_params: HashMap<String, String>,
}

/// Filter mapping.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FilterMappingConfig {
    /// Name of the mapped filter.
    pub filter_name: String,

    /// URL patterns; `*` matches every URL.
    #[serde(default)]
    pub url_patterns: Vec<String>,

    /// Servlet names; `*` matches every servlet.
    #[serde(default)]
    pub servlet_names: Vec<String>,

    /// Dispatcher types (REQUEST, FORWARD, INCLUDE, ASYNC, ERROR).
    /// Empty means REQUEST.
    #[serde(default)]
    pub dispatchers: Vec<String>,
}

/// Servlet definition.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServletConfig {
    /// Unique servlet name.
    pub name: String,

    /// Implementation class registered with the component factory.
    pub class: String,

    /// URL patterns routed to this servlet.
    #[serde(default)]
    pub url_patterns: Vec<String>,

    /// Whether the servlet supports asynchronous continuation.
    #[serde(default)]
    pub async_supported: bool,

    /// Parameters passed to the servlet on construction.
    #[serde(default)]
    pub init_params: HashMap<String, String>,
}
