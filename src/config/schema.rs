//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a service built on appkit.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Service name, shown on the index page and admin status.
    pub name: String,

    /// Service version, sent as `x-app-version` on public responses.
    pub version: String,

    /// Deployment environment (e.g. "dev", "staging", "prod").
    pub env: String,

    /// Public host name the service is reachable under.
    pub host: String,

    /// Network endpoints.
    pub listener: ListenerConfig,

    /// Shutdown timing.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "appkit".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            env: "dev".to_string(),
            host: "localhost".to_string(),
            listener: ListenerConfig::default(),
            shutdown: ShutdownConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Endpoint configuration. A port of `0` disables that endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface all endpoints bind to (e.g. "0.0.0.0").
    pub host: String,

    /// Primary RPC surface.
    pub grpc_port: u16,

    /// Public data-plane HTTP surface.
    pub http_port: u16,

    /// Administrative/diagnostic HTTP surface.
    pub http_admin_port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            grpc_port: 0,
            http_port: 8080,
            http_admin_port: 8081,
        }
    }
}

/// Shutdown timing applied to every endpoint's shutdown action.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Pause before graceful stop so load balancers can de-register us.
    pub grace_delay_ms: u64,

    /// Deadline for a graceful stop before the resource is force-stopped.
    pub graceful_timeout_ms: u64,
}

impl ShutdownConfig {
    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }

    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_millis(self.graceful_timeout_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_delay_ms: 3_000,
            graceful_timeout_ms: 10_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Install the Prometheus recorder and serve `/metrics` on the admin endpoint.
    pub metrics_enabled: bool,

    /// Interval between Prometheus histogram upkeep runs.
    pub metrics_upkeep_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_upkeep_ms: 5000,
        }
    }
}
