//! Upstream health checker (v1)
//!
//! Probes every host of the configured upstream clusters and maintains
//! their `FailedActiveHc` flags.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ loader ──▶ validation ──▶ HealthService
//!        │                                       │
//!        ▼                                       ▼
//!     watcher ──── host diffs ──────────▶ Cluster ──▶ HealthChecker
//!                                                        │
//!                                   ┌────────────────────┼────────────────────┐
//!                                   ▼                    ▼                    ▼
//!                              Session(host)        Session(host)        Session(host)
//!                              interval/timeout     interval/timeout     interval/timeout
//!                                   │                    │                    │
//!                                   └──── probe ─────────┴──── stats/metrics ─┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;

use upstream_health::config::loader::load_config;
use upstream_health::config::watcher::ConfigWatcher;
use upstream_health::lifecycle::signals::wait_for_signal;
use upstream_health::observability::{logging, metrics};
use upstream_health::{HealthService, Shutdown};

#[derive(Parser)]
#[command(name = "upstream-health")]
#[command(about = "Active health checker for upstream clusters", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "upstream-health.toml")]
    config: PathBuf,

    /// Do not watch the configuration file for host changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init(&config.observability.log_level);
    tracing::info!(
        config = ?cli.config,
        clusters = config.clusters.len(),
        "upstream-health v0.1.0 starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut service = HealthService::from_config(&config)?;
    service.start()?;

    let (watcher, mut updates) = ConfigWatcher::new(&cli.config);
    let _watcher = if cli.no_watch {
        None
    } else {
        match watcher.run() {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::error!(error = %e, "Failed to start config watcher, reloads disabled");
                None
            }
        }
    };

    let shutdown = Arc::new(Shutdown::new());
    let mut listener = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move { wait_for_signal(&shutdown).await }
    });

    loop {
        tokio::select! {
            _ = listener.wait() => break,
            Some(new_config) = updates.recv() => {
                if let Err(e) = service.apply_config(&new_config) {
                    tracing::error!(error = %e, "Failed to apply reloaded config");
                }
            }
        }
    }

    service.stop();
    tracing::info!("Shutdown complete");
    Ok(())
}
