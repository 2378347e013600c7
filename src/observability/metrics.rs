//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Provide the counter/gauge primitives health check stats are built on
//! - Mirror every update into the `metrics` facade, labelled by cluster
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `health_check_attempt_total` (counter): probes issued
//! - `health_check_success_total` / `health_check_failure_total` (counter)
//! - `health_check_network_failure_total` / `health_check_passive_failure_total` (counter)
//! - `health_check_verify_cluster_total` (counter): service name mismatches
//! - `health_check_healthy` (gauge): process-local healthy host count
//!
//! # Design Decisions
//! - Local atomics keep values readable without a recorder installed
//! - Low-overhead metric updates (atomic operations)

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Monotonic counter.
pub struct Counter {
    value: AtomicU64,
    handle: metrics::Counter,
}

impl Counter {
    pub fn new(name: &'static str, cluster: &str) -> Self {
        Self {
            value: AtomicU64::new(0),
            handle: metrics::counter!(name, "cluster" => cluster.to_string()),
        }
    }

    pub fn inc(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
        self.handle.increment(delta);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Point-in-time gauge.
pub struct Gauge {
    value: AtomicI64,
    handle: metrics::Gauge,
}

impl Gauge {
    pub fn new(name: &'static str, cluster: &str) -> Self {
        Self {
            value: AtomicI64::new(0),
            handle: metrics::gauge!(name, "cluster" => cluster.to_string()),
        }
    }

    pub fn update(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
        self.handle.set(value as f64);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}
