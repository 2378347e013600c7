//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → HealthConfigFile (validated, immutable)
//!     → one Cluster + HealthChecker per ClusterConfig
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → host diffs applied to running checkers
//! ```
//!
//! # Design Decisions
//! - Health check settings are immutable per checker; only host sets reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::HealthConfigFile;
pub use schema::ClusterConfig;
pub use schema::HostConfig;
pub use schema::HealthCheckConfig;
pub use schema::ProbeConfig;
pub use schema::ObservabilityConfig;
