//! Cluster and priority set management.
//!
//! # Responsibilities
//! - Group hosts into host sets by priority
//! - Assign stable host ids
//! - Swap in new host sets on reload, reusing hosts that are still present

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use arc_swap::ArcSwap;
use crate::config::{ClusterConfig, HostConfig};
use crate::upstream::host::{Host, HostId};

/// Hosts sharing one priority level.
#[derive(Debug, Clone)]
pub struct HostSet {
    priority: u32,
    hosts: Vec<Arc<Host>>,
}

impl HostSet {
    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }
}

/// All host sets of a cluster, ordered by ascending priority value.
#[derive(Debug, Clone, Default)]
pub struct PrioritySet {
    host_sets: Vec<HostSet>,
}

impl PrioritySet {
    fn from_hosts(hosts: Vec<Arc<Host>>) -> Self {
        let mut by_priority: BTreeMap<u32, Vec<Arc<Host>>> = BTreeMap::new();
        for host in hosts {
            by_priority.entry(host.priority).or_default().push(host);
        }
        Self {
            host_sets: by_priority
                .into_iter()
                .map(|(priority, hosts)| HostSet { priority, hosts })
                .collect(),
        }
    }

    pub fn host_sets_by_priority(&self) -> &[HostSet] {
        &self.host_sets
    }

    /// Every host across all priorities.
    pub fn all_hosts(&self) -> impl Iterator<Item = &Arc<Host>> {
        self.host_sets.iter().flat_map(|set| set.hosts.iter())
    }
}

/// Result of a host set update.
#[derive(Debug, Default)]
pub struct HostDiff {
    pub added: Vec<Arc<Host>>,
    pub removed: Vec<Arc<Host>>,
}

impl HostDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// An upstream cluster.
#[derive(Debug)]
pub struct Cluster {
    name: String,
    next_id: AtomicU64,
    priority_set: ArcSwap<PrioritySet>,
    /// Serializes updates so concurrent reloads do not lose hosts.
    update_lock: Mutex<()>,
}

impl Cluster {
    /// Create an empty cluster.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: AtomicU64::new(1),
            priority_set: ArcSwap::from_pointee(PrioritySet::default()),
            update_lock: Mutex::new(()),
        }
    }

    /// Create a cluster from configuration.
    pub fn from_config(config: &ClusterConfig) -> Self {
        let cluster = Self::new(config.name.clone());
        cluster.update_hosts(&config.hosts);
        cluster
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current priority set.
    pub fn priority_set(&self) -> Arc<PrioritySet> {
        self.priority_set.load_full()
    }

    /// Replace the host list. Hosts whose address and priority are unchanged
    /// keep their identity and flags.
    pub fn update_hosts(&self, configs: &[HostConfig]) -> HostDiff {
        let _guard = self.update_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.priority_set.load_full();

        let mut existing: HashMap<(SocketAddr, u32), Arc<Host>> = current
            .all_hosts()
            .map(|host| ((host.address, host.priority), host.clone()))
            .collect();

        let mut diff = HostDiff::default();
        let mut hosts = Vec::with_capacity(configs.len());

        for config in configs {
            let Ok(address) = config.address.parse::<SocketAddr>() else {
                tracing::warn!(cluster = %self.name, address = %config.address, "Invalid host address");
                continue;
            };
            let key = (address, config.priority);
            if let Some(host) = existing.remove(&key) {
                hosts.push(host);
            } else if hosts.iter().any(|h: &Arc<Host>| (h.address, h.priority) == key) {
                tracing::warn!(cluster = %self.name, address = %address, "Duplicate host entry ignored");
            } else {
                let id = HostId(self.next_id.fetch_add(1, Ordering::Relaxed));
                let host = Arc::new(Host::new(id, address, config.priority));
                diff.added.push(host.clone());
                hosts.push(host);
            }
        }

        diff.removed = existing.into_values().collect();
        self.priority_set.store(Arc::new(PrioritySet::from_hosts(hosts)));

        if !diff.is_empty() {
            tracing::info!(
                cluster = %self.name,
                added = diff.added.len(),
                removed = diff.removed.len(),
                "Cluster host set updated"
            );
        }
        diff
    }
}
