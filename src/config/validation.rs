//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, interval and timeout > 0)
//! - Check host addresses and cluster name uniqueness
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use crate::config::schema::{ClusterConfig, HealthCheckConfig, HealthConfigFile, ProbeConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be at least 1")]
    ZeroThreshold { field: &'static str },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("cluster name must not be empty")]
    EmptyClusterName,

    #[error("duplicate cluster name '{0}'")]
    DuplicateCluster(String),

    #[error("cluster '{cluster}': invalid host address '{address}'")]
    InvalidHostAddress { cluster: String, address: String },

    #[error("http probe path '{0}' must start with '/'")]
    InvalidProbePath(String),
}

/// Validate a whole configuration file.
pub fn validate_config(config: &HealthConfigFile) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for cluster in &config.clusters {
        if cluster.name.is_empty() {
            errors.push(ValidationError::EmptyClusterName);
        } else if !seen.insert(cluster.name.as_str()) {
            errors.push(ValidationError::DuplicateCluster(cluster.name.clone()));
        }
        collect_cluster_errors(cluster, &mut errors);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Validate the settings a `HealthChecker` is constructed from.
pub fn validate_health_check(config: &HealthCheckConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    collect_health_check_errors(config, &mut errors);
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn collect_cluster_errors(cluster: &ClusterConfig, errors: &mut Vec<ValidationError>) {
    collect_health_check_errors(&cluster.health_check, errors);

    for host in &cluster.hosts {
        if host.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidHostAddress {
                cluster: cluster.name.clone(),
                address: host.address.clone(),
            });
        }
    }
}

fn collect_health_check_errors(config: &HealthCheckConfig, errors: &mut Vec<ValidationError>) {
    if config.healthy_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold { field: "healthy_threshold" });
    }
    if config.unhealthy_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold { field: "unhealthy_threshold" });
    }
    if config.interval_ms == 0 {
        errors.push(ValidationError::ZeroDuration { field: "interval_ms" });
    }
    if config.timeout_ms == 0 {
        errors.push(ValidationError::ZeroDuration { field: "timeout_ms" });
    }
    if let ProbeConfig::Http { path, .. } = &config.probe {
        if !path.starts_with('/') {
            errors.push(ValidationError::InvalidProbePath(path.clone()));
        }
    }
}
