//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the health
//! checker. All types derive Serde traits for deserialization from config files.

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Root configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HealthConfigFile {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Upstream clusters to health check.
    pub clusters: Vec<ClusterConfig>,
}

/// An upstream cluster and the hosts that belong to it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Cluster identifier for logging/metrics.
    pub name: String,

    /// Active health check settings for every host in the cluster.
    #[serde(default)]
    pub health_check: HealthCheckConfig,

    /// Host definitions.
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

/// Upstream host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostConfig {
    /// Host address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Priority level (0 = highest).
    #[serde(default)]
    pub priority: u32,
}

/// Active health check configuration.
///
/// Immutable once handed to a `HealthChecker`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Deadline for a single probe's own I/O, in milliseconds.
    pub timeout_ms: u64,

    /// Base interval between probes, in milliseconds.
    pub interval_ms: u64,

    /// Upper bound (exclusive) of the random delay added to every interval.
    /// Zero disables jitter.
    pub interval_jitter_ms: u64,

    /// Number of consecutive successes before an unhealthy host is cleared.
    pub healthy_threshold: u32,

    /// Number of consecutive failures before a healthy host is flagged.
    pub unhealthy_threshold: u32,

    /// Probe protocol.
    pub probe: ProbeConfig,
}

impl HealthCheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn interval_jitter(&self) -> Duration {
        Duration::from_millis(self.interval_jitter_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            interval_ms: 5000,
            interval_jitter_ms: 0,
            healthy_threshold: 2,
            unhealthy_threshold: 3,
            probe: ProbeConfig::default(),
        }
    }
}

/// Probe protocol selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeConfig {
    /// Plain TCP connect.
    #[default]
    Tcp,
    /// HTTP GET, 2xx is healthy.
    Http {
        /// Path to probe.
        path: String,
        /// Expected value of the `x-envoy-upstream-healthchecked-cluster`
        /// response header, if any.
        #[serde(default)]
        service_name: Option<String>,
    },
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
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
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_cluster_uses_defaults() {
        let file: HealthConfigFile = toml::from_str(
            r#"
            [[clusters]]
            name = "web"

            [[clusters.hosts]]
            address = "127.0.0.1:3000"
            "#,
        )
        .unwrap();

        let cluster = &file.clusters[0];
        assert_eq!(cluster.hosts[0].priority, 0);
        assert_eq!(cluster.health_check.healthy_threshold, 2);
        assert_eq!(cluster.health_check.unhealthy_threshold, 3);
        assert_eq!(cluster.health_check.probe, ProbeConfig::Tcp);
        assert_eq!(file.observability.log_level, "info");
    }

    #[test]
    fn test_http_probe_and_durations() {
        let file: HealthConfigFile = toml::from_str(
            r#"
            [[clusters]]
            name = "api"

            [clusters.health_check]
            timeout_ms = 250
            interval_ms = 2000
            interval_jitter_ms = 300

            [clusters.health_check.probe]
            type = "http"
            path = "/healthz"
            service_name = "api"
            "#,
        )
        .unwrap();

        let hc = &file.clusters[0].health_check;
        assert_eq!(hc.timeout(), Duration::from_millis(250));
        assert_eq!(hc.interval(), Duration::from_secs(2));
        assert_eq!(hc.interval_jitter(), Duration::from_millis(300));
        assert_eq!(
            hc.probe,
            ProbeConfig::Http {
                path: "/healthz".into(),
                service_name: Some("api".into()),
            }
        );
    }
}
