//! Per-cluster health check statistics.

use crate::observability::metrics::{Counter, Gauge};

/// Counters and the healthy gauge for one checker.
pub struct HealthCheckStats {
    pub attempt: Counter,
    pub success: Counter,
    pub failure: Counter,
    pub network_failure: Counter,
    pub passive_failure: Counter,
    pub verify_cluster: Counter,
    pub healthy: Gauge,
}

impl HealthCheckStats {
    pub fn new(cluster: &str) -> Self {
        Self {
            attempt: Counter::new("health_check_attempt_total", cluster),
            success: Counter::new("health_check_success_total", cluster),
            failure: Counter::new("health_check_failure_total", cluster),
            network_failure: Counter::new("health_check_network_failure_total", cluster),
            passive_failure: Counter::new("health_check_passive_failure_total", cluster),
            verify_cluster: Counter::new("health_check_verify_cluster_total", cluster),
            healthy: Gauge::new("health_check_healthy", cluster),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            attempt: self.attempt.get(),
            success: self.success.get(),
            failure: self.failure.get(),
            network_failure: self.network_failure.get(),
            passive_failure: self.passive_failure.get(),
            verify_cluster: self.verify_cluster.get(),
            healthy: self.healthy.get(),
        }
    }
}

/// Read-only copy of `HealthCheckStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub attempt: u64,
    pub success: u64,
    pub failure: u64,
    pub network_failure: u64,
    pub passive_failure: u64,
    pub verify_cluster: u64,
    pub healthy: i64,
}
