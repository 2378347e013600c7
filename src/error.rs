//! Health checker error types.

use thiserror::Error;
use crate::config::validation::ValidationError;

/// Errors surfaced by `HealthChecker` construction and startup.
///
/// Probe failures never show up here; they are folded into the per-host
/// threshold state machine.
#[derive(Debug, Error)]
pub enum HealthCheckError {
    #[error("invalid health check config: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    InvalidConfig(Vec<ValidationError>),

    #[error("health checker has no bound cluster")]
    MissingCluster,

    #[error("health checker has no probe strategy")]
    MissingProbe,

    #[error("health checker must be started inside a tokio runtime")]
    NoRuntime,
}
