//! Shared utilities for health checker integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use upstream_health::config::{HealthCheckConfig, HostConfig};
use upstream_health::health::{HealthProbe, ProbeReporter};
use upstream_health::upstream::{Cluster, HealthFlag, Host};
use upstream_health::HealthChecker;

/// Outcome a scripted probe reports for one attempt.
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum Step {
    Pass,
    Fail,
    /// Never report; the session's timeout decides.
    Hang,
}

/// Probe that replays a fixed script and reports synchronously.
/// Once the script runs out every attempt hangs.
#[derive(Default)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Step>>,
    held: Mutex<Vec<ProbeReporter>>,
}

#[allow(dead_code)]
impl ScriptedProbe {
    pub fn new(steps: &[Step]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.iter().copied().collect()),
            held: Mutex::new(Vec::new()),
        })
    }

    /// Probe that never reports.
    pub fn hanging() -> Arc<Self> {
        Self::new(&[])
    }

    /// Reporters of attempts that were never answered.
    pub fn take_held(&self) -> Vec<ProbeReporter> {
        std::mem::take(&mut *self.held.lock().unwrap())
    }
}

impl HealthProbe for ScriptedProbe {
    fn on_interval(&self, _host: &Arc<Host>, reporter: ProbeReporter) {
        let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Hang);
        match step {
            Step::Pass => reporter.success(),
            Step::Fail => reporter.failure(),
            Step::Hang => self.held.lock().unwrap().push(reporter),
        }
    }
}

/// One callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckEvent {
    pub changed: bool,
    pub flagged: bool,
}

#[allow(dead_code)]
pub fn health_config(healthy: u32, unhealthy: u32, interval: Duration) -> HealthCheckConfig {
    HealthCheckConfig {
        interval_ms: interval.as_millis() as u64,
        healthy_threshold: healthy,
        unhealthy_threshold: unhealthy,
        ..HealthCheckConfig::default()
    }
}

#[allow(dead_code)]
pub fn cluster_with_hosts(name: &str, count: u16) -> Arc<Cluster> {
    let cluster = Arc::new(Cluster::new(name));
    let hosts: Vec<HostConfig> = (0..count)
        .map(|i| HostConfig { address: format!("127.0.0.1:{}", 20_000 + i), priority: (i % 2) as u32 })
        .collect();
    cluster.update_hosts(&hosts);
    cluster
}

/// Build a checker and subscribe to its callbacks.
#[allow(dead_code)]
pub fn checker_with_events(
    config: HealthCheckConfig,
    cluster: Arc<Cluster>,
    probe: Arc<dyn HealthProbe>,
) -> (HealthChecker, mpsc::UnboundedReceiver<CheckEvent>) {
    let checker = HealthChecker::new(cluster.name(), config)
        .unwrap()
        .with_cluster(cluster)
        .with_probe(probe);

    let (tx, rx) = mpsc::unbounded_channel();
    checker.add_host_check_complete_cb(move |host, changed| {
        let _ = tx.send(CheckEvent {
            changed,
            flagged: host.contain_health_flag(HealthFlag::FailedActiveHc),
        });
    });
    (checker, rx)
}

#[allow(dead_code)]
pub fn first_host(cluster: &Cluster) -> Arc<Host> {
    cluster.priority_set().all_hosts().next().cloned().unwrap()
}
