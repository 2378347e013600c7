//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! HealthChecker::start (checker.rs)
//!     → enumerate hosts across priority sets
//!     → one HealthCheckSession per host (session.rs)
//!
//! Per session:
//!     interval timer (timer.rs) fires
//!     → probe hook issues probe (probe/), timeout timer armed
//!     → success / failure / timeout
//!     → counters, host flag, healthy count, stats (stats.rs), callbacks
//!     → interval timer re-armed with fresh jitter
//!
//! Passive failures:
//!     traffic observer → HealthChecker::set_unhealthy → same state machine,
//!     timers untouched
//! ```
//!
//! # Design Decisions
//! - Thresholds give hysteresis: N consecutive identical outcomes flip state
//! - Transitions are edge-triggered on the host's `FailedActiveHc` flag
//! - Sessions run fully concurrently; each session is serialized by its lock

pub mod checker;
pub mod probe;
pub mod session;
pub mod stats;
mod timer;

pub use checker::{HealthChecker, HostCheckCb};
pub use probe::{HealthProbe, HttpProbe, ProbeReporter, TcpProbe};
pub use session::{SessionCounters, SessionPhase};
pub use stats::StatsSnapshot;

/// Origin of a failure; selects the stats counter it is recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Active probe failed or timed out.
    Network,
    /// Reported from observed traffic.
    Passive,
}
