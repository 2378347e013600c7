//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Health checker and sessions produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging with per-host fields
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
