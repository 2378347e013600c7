//! Active upstream health checking for a data-plane proxy.

pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod upstream;

pub use config::HealthConfigFile;
pub use error::HealthCheckError;
pub use health::{FailureType, HealthChecker};
pub use lifecycle::{HealthService, Shutdown};
