//! Upstream host abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream host with a stable identity
//! - Carry the health flags consumed by routing and load balancing
//!
//! # Design Decisions
//! - Flags are an atomic bitset so checkers and passive detectors can
//!   mutate them without a host-wide lock
//! - Identity is an assigned id, never the host's mutable state

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};

/// Stable host identity, assigned by the owning cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(pub u64);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host-{}", self.0)
    }
}

/// Health flag bits.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthFlag {
    /// The host failed active health checking.
    FailedActiveHc = 0x1,
    /// The host was ejected by outlier (passive) detection.
    FailedOutlierCheck = 0x2,
}

/// A single upstream host.
#[derive(Debug)]
pub struct Host {
    id: HostId,
    /// The address of the host.
    pub address: SocketAddr,
    /// Priority level this host belongs to.
    pub priority: u32,
    flags: AtomicU32,
}

impl Host {
    /// Create a new host with no health flags set.
    pub fn new(id: HostId, address: SocketAddr, priority: u32) -> Self {
        Self {
            id,
            address,
            priority,
            flags: AtomicU32::new(0),
        }
    }

    pub fn id(&self) -> HostId {
        self.id
    }

    pub fn contain_health_flag(&self, flag: HealthFlag) -> bool {
        self.flags.load(Ordering::Acquire) & (flag as u32) != 0
    }

    pub fn set_health_flag(&self, flag: HealthFlag) {
        self.flags.fetch_or(flag as u32, Ordering::AcqRel);
    }

    pub fn clear_health_flag(&self, flag: HealthFlag) {
        self.flags.fetch_and(!(flag as u32), Ordering::AcqRel);
    }

    /// Return true if no health flag is set.
    pub fn is_healthy(&self) -> bool {
        self.flags.load(Ordering::Acquire) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_independent() {
        let host = Host::new(HostId(1), "127.0.0.1:8080".parse().unwrap(), 0);
        assert!(host.is_healthy());

        host.set_health_flag(HealthFlag::FailedActiveHc);
        host.set_health_flag(HealthFlag::FailedOutlierCheck);
        assert!(host.contain_health_flag(HealthFlag::FailedActiveHc));

        host.clear_health_flag(HealthFlag::FailedActiveHc);
        assert!(!host.contain_health_flag(HealthFlag::FailedActiveHc));
        assert!(host.contain_health_flag(HealthFlag::FailedOutlierCheck));
        assert!(!host.is_healthy());

        host.clear_health_flag(HealthFlag::FailedOutlierCheck);
        assert!(host.is_healthy());
    }

    #[test]
    fn test_display_id() {
        let host = Host::new(HostId(7), "10.1.2.3:9000".parse().unwrap(), 2);
        assert_eq!(host.id().to_string(), "host-7");
    }
}
