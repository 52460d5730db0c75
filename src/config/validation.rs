//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports distinct)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before any listener is bound

use std::collections::HashMap;
use std::net::IpAddr;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("service name must not be empty")]
    EmptyName,

    #[error("listener host '{0}' is not an IP address")]
    InvalidHost(String),

    #[error("endpoints '{first}' and '{second}' share port {port}")]
    PortConflict {
        first: &'static str,
        second: &'static str,
        port: u16,
    },

    #[error("shutdown.graceful_timeout_ms must be greater than zero")]
    ZeroGracefulTimeout,

    #[error("observability.metrics_upkeep_ms must be greater than zero")]
    ZeroMetricsUpkeep,
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    }

    if config.listener.host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidHost(config.listener.host.clone()));
    }

    let ports = [
        ("rpc", config.listener.grpc_port),
        ("http.public", config.listener.http_port),
        ("http.admin", config.listener.http_admin_port),
    ];
    let mut seen: HashMap<u16, &'static str> = HashMap::new();
    for (name, port) in ports {
        if port == 0 {
            continue;
        }
        if let Some(first) = seen.insert(port, name) {
            errors.push(ValidationError::PortConflict {
                first,
                second: name,
                port,
            });
        }
    }

    if config.shutdown.graceful_timeout_ms == 0 {
        errors.push(ValidationError::ZeroGracefulTimeout);
    }

    if config.observability.metrics_enabled && config.observability.metrics_upkeep_ms == 0 {
        errors.push(ValidationError::ZeroMetricsUpkeep);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
