//! Startup orchestration and reload application.
//!
//! # Responsibilities
//! - Build one cluster and one health checker per configured cluster
//! - Start every checker
//! - Apply reloaded configuration as host diffs
//! - Stop everything on shutdown
//!
//! # Design Decisions
//! - Fail fast: a checker that cannot start aborts startup
//! - Host diffs keep surviving hosts' sessions and flags intact
//! - A changed health check config replaces that cluster's checker

use std::collections::BTreeMap;
use std::sync::Arc;
use crate::config::{ClusterConfig, HealthConfigFile};
use crate::error::HealthCheckError;
use crate::health::{probe, HealthChecker};
use crate::upstream::{Cluster, HostId};

struct ClusterEntry {
    config: ClusterConfig,
    cluster: Arc<Cluster>,
    checker: Arc<HealthChecker>,
}

impl ClusterEntry {
    fn build(config: &ClusterConfig, cluster: Arc<Cluster>) -> Result<Self, HealthCheckError> {
        let checker = HealthChecker::new(&config.name, config.health_check.clone())?
            .with_cluster(cluster.clone())
            .with_probe(probe::from_config(&config.health_check));

        Ok(Self {
            config: config.clone(),
            cluster,
            checker: Arc::new(checker),
        })
    }
}

/// Every cluster and checker of the running process.
pub struct HealthService {
    clusters: BTreeMap<String, ClusterEntry>,
}

impl HealthService {
    pub fn from_config(config: &HealthConfigFile) -> Result<Self, HealthCheckError> {
        let mut clusters = BTreeMap::new();
        for cluster_config in &config.clusters {
            let cluster = Arc::new(Cluster::from_config(cluster_config));
            let entry = ClusterEntry::build(cluster_config, cluster)?;
            clusters.insert(cluster_config.name.clone(), entry);
        }
        Ok(Self { clusters })
    }

    /// Start every checker. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), HealthCheckError> {
        for entry in self.clusters.values() {
            entry.checker.start()?;
        }
        tracing::info!(clusters = self.clusters.len(), "Health service started");
        Ok(())
    }

    /// Bring running checkers in line with a reloaded configuration.
    pub fn apply_config(&mut self, config: &HealthConfigFile) -> Result<(), HealthCheckError> {
        let wanted: BTreeMap<&str, &ClusterConfig> =
            config.clusters.iter().map(|c| (c.name.as_str(), c)).collect();

        let gone: Vec<String> = self
            .clusters
            .keys()
            .filter(|name| !wanted.contains_key(name.as_str()))
            .cloned()
            .collect();
        for name in gone {
            if let Some(entry) = self.clusters.remove(&name) {
                entry.checker.stop();
                tracing::info!(cluster = %name, "Cluster removed");
            }
        }

        for (name, cluster_config) in wanted {
            match self.clusters.get_mut(name) {
                Some(entry) if entry.config.health_check == cluster_config.health_check => {
                    let diff = entry.cluster.update_hosts(&cluster_config.hosts);
                    let removed: Vec<HostId> = diff.removed.iter().map(|h| h.id()).collect();
                    entry.checker.remove_hosts(&removed);
                    entry.checker.add_hosts(&diff.added);
                    entry.config = cluster_config.clone();
                }
                Some(entry) => {
                    // A rejected replacement leaves the running checker alone.
                    let replacement = ClusterEntry::build(cluster_config, entry.cluster.clone())?;
                    entry.checker.stop();
                    entry.cluster.update_hosts(&cluster_config.hosts);
                    if let Err(e) = replacement.checker.start() {
                        self.clusters.remove(name);
                        tracing::error!(cluster = %name, error = %e, "Replacement checker failed to start, cluster dropped");
                        return Err(e);
                    }
                    *entry = replacement;
                    tracing::info!(cluster = %name, "Health check settings changed, checker replaced");
                }
                None => {
                    let cluster = Arc::new(Cluster::from_config(cluster_config));
                    let entry = ClusterEntry::build(cluster_config, cluster)?;
                    entry.checker.start()?;
                    self.clusters.insert(name.to_string(), entry);
                    tracing::info!(cluster = %name, "Cluster added");
                }
            }
        }
        Ok(())
    }

    pub fn checker(&self, cluster: &str) -> Option<&Arc<HealthChecker>> {
        self.clusters.get(cluster).map(|entry| &entry.checker)
    }

    pub fn cluster(&self, cluster: &str) -> Option<&Arc<Cluster>> {
        self.clusters.get(cluster).map(|entry| &entry.cluster)
    }

    pub fn stop(&self) {
        for entry in self.clusters.values() {
            entry.checker.stop();
        }
        tracing::info!("Health service stopped");
    }
}
