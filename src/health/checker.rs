//! Cluster-level health check coordinator.
//!
//! # Responsibilities
//! - Create one session per host across every priority level
//! - Compute jittered probe intervals
//! - Own the process-local healthy count and its gauge
//! - Fan out host check results to registered callbacks
//!
//! # Design Decisions
//! - Sessions are keyed by `HostId`, so re-running `start` or re-adding a
//!   host never creates a second session
//! - The healthy count and gauge refresh share one short lock; it is never
//!   held across a probe hook
//! - Callbacks are copy-on-write (`ArcSwap`) and never block registration

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use rand::Rng;
use tokio::runtime::Handle;
use crate::config::validation::validate_health_check;
use crate::config::HealthCheckConfig;
use crate::error::HealthCheckError;
use crate::health::probe::HealthProbe;
use crate::health::session::{HealthCheckSession, SessionCounters};
use crate::health::stats::{HealthCheckStats, StatsSnapshot};
use crate::health::FailureType;
use crate::upstream::{Cluster, Host, HostId};

/// Invoked after every probe result with `(host, changed)`.
pub type HostCheckCb = Arc<dyn Fn(&Arc<Host>, bool) + Send + Sync>;

/// State shared between the coordinator and its sessions.
pub(crate) struct CheckerShared {
    name: String,
    config: HealthCheckConfig,
    stats: HealthCheckStats,
    callbacks: ArcSwap<Vec<HostCheckCb>>,
    local_process_healthy: Mutex<i64>,
}

impl CheckerShared {
    pub(crate) fn new(name: &str, config: HealthCheckConfig) -> Self {
        Self {
            name: name.to_string(),
            stats: HealthCheckStats::new(name),
            config,
            callbacks: ArcSwap::from_pointee(Vec::new()),
            local_process_healthy: Mutex::new(0),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    pub(crate) fn stats(&self) -> &HealthCheckStats {
        &self.stats
    }

    /// `interval + U[0, interval_jitter)`, saturating at `Duration::MAX`.
    pub(crate) fn get_interval(&self) -> Duration {
        let base = self.config.interval();
        let jitter = self.config.interval_jitter();
        if jitter.is_zero() {
            return base;
        }

        let jitter_nanos = u64::try_from(jitter.as_nanos()).unwrap_or(u64::MAX);
        let offset = Duration::from_nanos(rand::thread_rng().gen_range(0..jitter_nanos));
        base.checked_add(offset).unwrap_or(Duration::MAX)
    }

    pub(crate) fn dec_healthy(&self) {
        self.adjust_healthy(-1);
    }

    pub(crate) fn adjust_healthy(&self, delta: i64) {
        let mut healthy = self.lock_healthy();
        *healthy += delta;
        self.stats.healthy.update(*healthy);
    }

    pub(crate) fn local_process_healthy(&self) -> i64 {
        *self.lock_healthy()
    }

    pub(crate) fn run_callbacks(&self, host: &Arc<Host>, changed: bool) {
        self.refresh_healthy_stat();

        for cb in self.callbacks.load().iter() {
            cb(host, changed);
        }
    }

    fn refresh_healthy_stat(&self) {
        let healthy = self.lock_healthy();
        self.stats.healthy.update(*healthy);
    }

    fn lock_healthy(&self) -> MutexGuard<'_, i64> {
        self.local_process_healthy.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Active health checker for one cluster.
pub struct HealthChecker {
    shared: Arc<CheckerShared>,
    cluster: Option<Arc<Cluster>>,
    probe: Option<Arc<dyn HealthProbe>>,
    sessions: DashMap<HostId, Arc<HealthCheckSession>>,
    /// Runtime the timers run on; `Some` while started.
    running: Mutex<Option<Handle>>,
}

impl HealthChecker {
    /// Create a checker. Thresholds must be at least 1 and the interval
    /// non-zero; zero jitter disables jitter.
    pub fn new(name: &str, config: HealthCheckConfig) -> Result<Self, HealthCheckError> {
        validate_health_check(&config).map_err(HealthCheckError::InvalidConfig)?;

        Ok(Self {
            shared: Arc::new(CheckerShared::new(name, config)),
            cluster: None,
            probe: None,
            sessions: DashMap::new(),
            running: Mutex::new(None),
        })
    }

    pub fn with_cluster(mut self, cluster: Arc<Cluster>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn name(&self) -> &str {
        self.shared.name()
    }

    /// Create and start a session for every host in the bound cluster.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), HealthCheckError> {
        let cluster = self.cluster.as_ref().ok_or(HealthCheckError::MissingCluster)?;
        let probe = self.probe.as_ref().ok_or(HealthCheckError::MissingProbe)?;
        let runtime = Handle::try_current().map_err(|_| HealthCheckError::NoRuntime)?;

        let started = {
            let mut running = self.lock_running();
            *running = Some(runtime.clone());
            let priority_set = cluster.priority_set();
            self.create_sessions(priority_set.all_hosts(), probe, &runtime)
        };

        tracing::info!(
            cluster = %self.name(),
            hosts = self.sessions.len(),
            interval_ms = self.shared.config().interval_ms,
            "Health checker started"
        );
        Self::start_sessions(&runtime, started);
        Ok(())
    }

    /// Begin checking hosts added to the cluster after `start`.
    pub fn add_hosts(&self, hosts: &[Arc<Host>]) {
        let Some(probe) = self.probe.as_ref() else {
            return;
        };

        let (runtime, started) = {
            let running = self.lock_running();
            let Some(runtime) = running.clone() else {
                tracing::debug!(cluster = %self.name(), "Checker not running, hosts will be picked up on start");
                return;
            };
            let started = self.create_sessions(hosts.iter(), probe, &runtime);
            (runtime, started)
        };

        Self::start_sessions(&runtime, started);
    }

    /// Stop checking hosts that left the cluster.
    pub fn remove_hosts(&self, ids: &[HostId]) {
        let _running = self.lock_running();
        for id in ids {
            if let Some((_, session)) = self.sessions.remove(id) {
                let contribution = session.stop();
                self.shared.adjust_healthy(-contribution);
                tracing::info!(cluster = %self.name(), host = %session.host().address, "Host removed from health checking");
            }
        }
    }

    /// Cancel every session. No callback or stat update attributable to a
    /// session happens once this returns.
    pub fn stop(&self) {
        let mut running = self.lock_running();
        if running.take().is_none() {
            return;
        }

        let ids: Vec<HostId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, session)) = self.sessions.remove(&id) {
                let contribution = session.stop();
                self.shared.adjust_healthy(-contribution);
            }
        }
        tracing::info!(cluster = %self.name(), "Health checker stopped");
    }

    /// Register a callback run after every probe result.
    ///
    /// Callbacks run while the reporting session is locked. They must not
    /// start, stop or change the host set of this checker, report passive
    /// failures to it, nor call `session_counters` for any host: two
    /// sessions reporting at once would each wait on the other's lock.
    /// `stats` and `local_process_healthy` are safe to read.
    pub fn add_host_check_complete_cb<F>(&self, cb: F)
    where
        F: Fn(&Arc<Host>, bool) + Send + Sync + 'static,
    {
        let cb: HostCheckCb = Arc::new(cb);
        self.shared.callbacks.rcu(|callbacks| {
            let mut callbacks = Vec::clone(callbacks);
            callbacks.push(cb.clone());
            callbacks
        });
    }

    /// Report a failure observed outside active checking (e.g. real traffic).
    pub fn set_unhealthy(&self, host: HostId, failure_type: FailureType) {
        let session = self.sessions.get(&host).map(|entry| entry.value().clone());
        match session {
            Some(session) => session.set_unhealthy(failure_type),
            None => tracing::debug!(cluster = %self.name(), host = %host, "Failure reported for unknown host"),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats().snapshot()
    }

    pub fn local_process_healthy(&self) -> i64 {
        self.shared.local_process_healthy()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session_counters(&self, host: HostId) -> Option<SessionCounters> {
        let session = self.sessions.get(&host).map(|entry| entry.value().clone())?;
        Some(session.counters())
    }

    pub fn get_interval(&self) -> Duration {
        self.shared.get_interval()
    }

    fn create_sessions<'a>(
        &self,
        hosts: impl Iterator<Item = &'a Arc<Host>>,
        probe: &Arc<dyn HealthProbe>,
        runtime: &Handle,
    ) -> Vec<Arc<HealthCheckSession>> {
        let mut created = Vec::new();
        for host in hosts {
            if self.sessions.contains_key(&host.id()) {
                continue;
            }
            let session = HealthCheckSession::new(
                self.shared.clone(),
                host.clone(),
                probe.clone(),
                runtime.clone(),
            );
            self.sessions.insert(host.id(), session.clone());
            created.push(session);
        }
        created
    }

    fn start_sessions(runtime: &Handle, sessions: Vec<Arc<HealthCheckSession>>) {
        let _enter = runtime.enter();
        for session in sessions {
            session.start();
        }
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<Handle>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for HealthChecker {
    fn drop(&mut self) {
        self.stop();
    }
}
