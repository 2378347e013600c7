//! Probe strategies.
//!
//! # Responsibilities
//! - Define the capability interface every concrete check type implements
//! - Hand probe outcomes back to the owning session
//!
//! # Design Decisions
//! - `on_interval` must not block: it starts the probe and returns, and the
//!   outcome comes back later through the one-shot `ProbeReporter`
//! - Reporters are tagged with their attempt, so results arriving after a
//!   timeout, a newer attempt, or `stop()` are discarded by the session
//! - Dropping a reporter without reporting leaves the attempt to the
//!   session's timeout timer

pub mod http;
pub mod tcp;

use std::sync::{Arc, Weak};
use crate::config::{HealthCheckConfig, ProbeConfig};
use crate::health::session::HealthCheckSession;
use crate::upstream::Host;

pub use self::http::HttpProbe;
pub use self::tcp::TcpProbe;

/// Wire-level behaviour of one check type (TCP connect, HTTP GET, ...).
pub trait HealthProbe: Send + Sync + 'static {
    /// Issue a probe against `host` and report its outcome via `reporter`.
    fn on_interval(&self, host: &Arc<Host>, reporter: ProbeReporter);

    /// The session's probe deadline passed; abort any in-flight work.
    fn on_timeout(&self, host: &Arc<Host>) {
        let _ = host;
    }

    /// The session was stopped; release anything held for `host`.
    fn on_stop(&self, host: &Arc<Host>) {
        self.on_timeout(host);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProbeOutcome {
    Success,
    Failure,
    VerifyClusterFailure,
}

/// One-shot handle for reporting the result of a single probe attempt.
#[derive(Debug)]
pub struct ProbeReporter {
    session: Weak<HealthCheckSession>,
    attempt: u64,
}

impl ProbeReporter {
    pub(crate) fn new(session: Weak<HealthCheckSession>, attempt: u64) -> Self {
        Self { session, attempt }
    }

    /// Attempt number within the session, starting at 1.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn success(self) {
        self.report(ProbeOutcome::Success);
    }

    pub fn failure(self) {
        self.report(ProbeOutcome::Failure);
    }

    /// The host answered but identified itself as a different service.
    pub fn verify_cluster_failure(self) {
        self.report(ProbeOutcome::VerifyClusterFailure);
    }

    fn report(self, outcome: ProbeOutcome) {
        if let Some(session) = self.session.upgrade() {
            session.report(self.attempt, outcome);
        }
    }
}

/// Build the probe strategy selected by `config`.
pub fn from_config(config: &HealthCheckConfig) -> Arc<dyn HealthProbe> {
    match &config.probe {
        ProbeConfig::Tcp => Arc::new(TcpProbe::new(config.timeout())),
        ProbeConfig::Http { path, service_name } => Arc::new(HttpProbe::new(
            path.clone(),
            service_name.clone(),
            config.timeout(),
        )),
    }
}
