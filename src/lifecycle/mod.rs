//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build clusters → Start checkers
//!
//! Reload (startup.rs):
//!     Watcher update → Host diffs → add/remove sessions
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/Ctrl-C → Trigger shutdown → Stop every checker
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then metrics, then checkers
//! - Stopping a checker cancels all of its timers before returning

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownListener};
pub use startup::HealthService;
