//! Upstream cluster model.
//!
//! # Data Flow
//! ```text
//! ClusterConfig
//!     → cluster.rs (assign host ids, group by priority)
//!     → PrioritySet → HostSet → Host
//!     → health checker enumerates hosts, mutates host.rs flags
//! ```
//!
//! # Design Decisions
//! - Hosts are shared (`Arc<Host>`); flags are the only mutable state
//! - Priority sets are swapped atomically on reload
//! - Load balancing reads `Host::is_healthy` and lives outside this crate

pub mod cluster;
pub mod host;

pub use cluster::{Cluster, HostDiff, HostSet, PrioritySet};
pub use host::{HealthFlag, Host, HostId};
