//! Per-host health check session.
//!
//! # States
//! ```text
//! Idle → AwaitingInterval → ProbeInFlight → AwaitingInterval → ...
//! any → Stopped (terminal)
//! ```
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: num_unhealthy reaches unhealthy_threshold
//! Unhealthy → Healthy: num_healthy reaches healthy_threshold
//! ```
//!
//! # Design Decisions
//! - Counter, flag, aggregate, stats and callbacks for one event are applied
//!   under the session lock, before any timer is re-armed
//! - The probe hook is always invoked with the lock released
//! - Timer firings and probe reports are checked against the current epoch
//!   and attempt, so nothing stale mutates state

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use crate::health::checker::CheckerShared;
use crate::health::probe::{HealthProbe, ProbeOutcome, ProbeReporter};
use crate::health::timer::Timer;
use crate::health::FailureType;
use crate::upstream::{HealthFlag, Host};

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingInterval,
    ProbeInFlight,
    Stopped,
}

/// Observable session counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCounters {
    pub num_healthy: u32,
    pub num_unhealthy: u32,
    pub phase: SessionPhase,
}

struct SessionState {
    phase: SessionPhase,
    num_healthy: u32,
    num_unhealthy: u32,
    attempt: u64,
    /// Net adjustment this session has applied to the aggregate healthy count.
    contribution: i64,
    /// Host was withheld from the healthy count at creation and has not
    /// been confirmed either way yet.
    reserved: bool,
}

pub struct HealthCheckSession {
    me: Weak<HealthCheckSession>,
    host: Arc<Host>,
    checker: Arc<CheckerShared>,
    probe: Arc<dyn HealthProbe>,
    interval_timer: Timer,
    timeout_timer: Timer,
    state: Mutex<SessionState>,
}

impl HealthCheckSession {
    pub(crate) fn new(
        checker: Arc<CheckerShared>,
        host: Arc<Host>,
        probe: Arc<dyn HealthProbe>,
        runtime: Handle,
    ) -> Arc<Self> {
        // Unflagged hosts stay out of the healthy count until a probe
        // confirms them.
        let reserved = !host.contain_health_flag(HealthFlag::FailedActiveHc);
        let mut contribution = 0;
        if reserved {
            checker.dec_healthy();
            contribution = -1;
        }

        Arc::new_cyclic(|me: &Weak<Self>| {
            let on_interval = me.clone();
            let on_timeout = me.clone();
            Self {
                me: me.clone(),
                host,
                checker,
                probe,
                interval_timer: Timer::new(
                    runtime.clone(),
                    Arc::new(move |epoch| {
                        if let Some(session) = on_interval.upgrade() {
                            session.on_interval_fired(Some(epoch));
                        }
                    }),
                ),
                timeout_timer: Timer::new(
                    runtime,
                    Arc::new(move |epoch| {
                        if let Some(session) = on_timeout.upgrade() {
                            session.on_timeout_fired(epoch);
                        }
                    }),
                ),
                state: Mutex::new(SessionState {
                    phase: SessionPhase::Idle,
                    num_healthy: 0,
                    num_unhealthy: 0,
                    attempt: 0,
                    contribution,
                    reserved,
                }),
            }
        })
    }

    pub fn host(&self) -> &Arc<Host> {
        &self.host
    }

    pub fn counters(&self) -> SessionCounters {
        let state = self.lock_state();
        SessionCounters {
            num_healthy: state.num_healthy,
            num_unhealthy: state.num_unhealthy,
            phase: state.phase,
        }
    }

    /// Issue the first probe right away, without waiting an interval.
    pub(crate) fn start(&self) {
        {
            let mut state = self.lock_state();
            if state.phase != SessionPhase::Idle {
                return;
            }
            state.phase = SessionPhase::AwaitingInterval;
        }
        self.on_interval_fired(None);
    }

    /// Cancel both timers and discard any outstanding probe. Returns the
    /// session's net contribution to the aggregate healthy count.
    pub(crate) fn stop(&self) -> i64 {
        let contribution = {
            let mut state = self.lock_state();
            if state.phase == SessionPhase::Stopped {
                return 0;
            }
            state.phase = SessionPhase::Stopped;
            self.interval_timer.stop();
            self.timeout_timer.stop();
            std::mem::take(&mut state.contribution)
        };
        self.probe.on_stop(&self.host);
        tracing::debug!(cluster = %self.checker.name(), host = %self.host.address, "Health check session stopped");
        contribution
    }

    /// Passive failure entry point. Timers are left alone.
    pub(crate) fn set_unhealthy(&self, failure_type: FailureType) {
        let mut state = self.lock_state();
        if state.phase == SessionPhase::Stopped {
            return;
        }
        self.apply_failure(&mut state, failure_type);
    }

    pub(crate) fn report(&self, attempt: u64, outcome: ProbeOutcome) {
        let mut state = self.lock_state();
        if state.phase != SessionPhase::ProbeInFlight || state.attempt != attempt {
            tracing::debug!(
                cluster = %self.checker.name(),
                host = %self.host.address,
                attempt,
                "Discarding stale probe result"
            );
            return;
        }

        match outcome {
            ProbeOutcome::Success => self.handle_success(&mut state),
            ProbeOutcome::Failure => self.handle_failure(&mut state, FailureType::Network),
            ProbeOutcome::VerifyClusterFailure => {
                self.checker.stats().verify_cluster.inc(1);
                self.handle_failure(&mut state, FailureType::Network);
            }
        }
    }

    fn on_interval_fired(&self, epoch: Option<u64>) {
        let attempt = {
            let mut state = self.lock_state();
            if state.phase != SessionPhase::AwaitingInterval {
                return;
            }
            if let Some(epoch) = epoch {
                if !self.interval_timer.is_current(epoch) {
                    return;
                }
            }
            state.attempt += 1;
            state.phase = SessionPhase::ProbeInFlight;
            // Armed before the hook runs so a synchronous report can stop it.
            self.timeout_timer.start(self.checker.get_interval());
            self.checker.stats().attempt.inc(1);
            state.attempt
        };

        self.probe.on_interval(&self.host, ProbeReporter::new(self.me.clone(), attempt));
    }

    fn on_timeout_fired(&self, epoch: u64) {
        {
            let mut state = self.lock_state();
            if state.phase != SessionPhase::ProbeInFlight || !self.timeout_timer.is_current(epoch) {
                return;
            }
            // Claim the attempt so a late report is discarded.
            state.phase = SessionPhase::AwaitingInterval;
            tracing::debug!(cluster = %self.checker.name(), host = %self.host.address, attempt = state.attempt, "Health check timed out");
        }

        self.probe.on_timeout(&self.host);

        let mut state = self.lock_state();
        if state.phase == SessionPhase::Stopped {
            return;
        }
        self.apply_failure(&mut state, FailureType::Network);
        self.interval_timer.start(self.checker.get_interval());
    }

    fn handle_success(&self, state: &mut SessionState) {
        state.num_unhealthy = 0;

        let mut changed = false;
        if self.host.contain_health_flag(HealthFlag::FailedActiveHc) {
            state.num_healthy = state.num_healthy.saturating_add(1);

            if state.num_healthy >= self.checker.config().healthy_threshold {
                self.host.clear_health_flag(HealthFlag::FailedActiveHc);
                // Flagged elsewhere while still reserved: release the reservation too.
                let delta = if std::mem::take(&mut state.reserved) { 2 } else { 1 };
                self.checker.adjust_healthy(delta);
                state.contribution += delta;
                changed = true;
                tracing::info!(cluster = %self.checker.name(), host = %self.host.address, "Host is now HEALTHY");
            }
        } else if state.reserved {
            // Release the reservation and count the host.
            state.reserved = false;
            self.checker.adjust_healthy(2);
            state.contribution += 2;
            tracing::debug!(cluster = %self.checker.name(), host = %self.host.address, "Host confirmed healthy");
        }

        self.checker.stats().success.inc(1);
        self.checker.run_callbacks(&self.host, changed);

        self.rearm(state);
    }

    fn handle_failure(&self, state: &mut SessionState, failure_type: FailureType) {
        self.apply_failure(state, failure_type);
        self.rearm(state);
    }

    fn apply_failure(&self, state: &mut SessionState, failure_type: FailureType) {
        state.num_healthy = 0;

        let mut changed = false;
        if !self.host.contain_health_flag(HealthFlag::FailedActiveHc) {
            state.num_unhealthy = state.num_unhealthy.saturating_add(1);

            if state.num_unhealthy >= self.checker.config().unhealthy_threshold {
                self.host.set_health_flag(HealthFlag::FailedActiveHc);
                // A reserved host was never counted; only the reservation is released.
                if std::mem::take(&mut state.reserved) {
                    self.checker.adjust_healthy(1);
                    state.contribution += 1;
                } else {
                    self.checker.dec_healthy();
                    state.contribution -= 1;
                }
                changed = true;
                tracing::warn!(
                    cluster = %self.checker.name(),
                    host = %self.host.address,
                    failure_type = ?failure_type,
                    "Host is now UNHEALTHY"
                );
            }
        }

        let stats = self.checker.stats();
        stats.failure.inc(1);
        match failure_type {
            FailureType::Network => stats.network_failure.inc(1),
            FailureType::Passive => stats.passive_failure.inc(1),
        }

        self.checker.run_callbacks(&self.host, changed);
    }

    fn rearm(&self, state: &mut SessionState) {
        self.timeout_timer.stop();
        state.phase = SessionPhase::AwaitingInterval;
        self.interval_timer.start(self.checker.get_interval());
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
