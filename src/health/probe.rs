//! Health probe: periodic backend liveness checks with asymmetric cadence.
//!
//! Distinguishes three situations a naive ping conflates:
//! - "page just loaded": a startup grace phase with long per-attempt
//!   timeouts absorbs the reconnect latency right after launch;
//! - "transient hiccup": a single dropped probe never flips the state,
//!   it takes a run of consecutive failures;
//! - "server truly down": once disconnected, probing *speeds up* (no
//!   backoff) because detecting recovery quickly matters more than
//!   reducing load on a dead server.

use crate::backend::ApiClient;
use crate::config::ProbeConfig;
use crate::types::{ConnectivityState, HealthSignal};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Connectivity transitions produced by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Connected,
    Disconnected,
}

// ============================================================================
// Connectivity Tracker (pure state machine)
// ============================================================================

/// The probe's transition rules, free of any I/O so they are directly
/// testable: grace phase, failure threshold, single-success recovery.
#[derive(Debug)]
pub struct ConnectivityTracker {
    state: ConnectivityState,
    initial_attempts_left: u32,
    failure_threshold: u32,
}

impl ConnectivityTracker {
    pub fn new(initial_attempts: u32, failure_threshold: u32) -> Self {
        Self {
            state: ConnectivityState::default(),
            initial_attempts_left: initial_attempts,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// Whether the startup grace phase is still active. The phase ends on
    /// the first success or once its attempts are used up; only failures
    /// after that count toward the disconnect threshold.
    pub fn in_initial_phase(&self) -> bool {
        self.initial_attempts_left > 0
    }

    pub fn state(&self) -> &ConnectivityState {
        &self.state
    }

    /// Record a successful probe. Any single success ends the grace phase,
    /// clears the failure streak, and — if the state was disconnected —
    /// yields the `Connected` transition.
    pub fn record_success(&mut self) -> Option<Transition> {
        self.initial_attempts_left = 0;
        self.state.consecutive_failures = 0;
        self.state.last_checked_at = Some(chrono::Utc::now());

        if self.state.connected {
            None
        } else {
            self.state.connected = true;
            Some(Transition::Connected)
        }
    }

    /// Record a failed probe. Grace-phase failures burn an attempt but
    /// never count toward the threshold; afterwards, crossing the
    /// threshold while connected yields the `Disconnected` transition.
    pub fn record_failure(&mut self) -> Option<Transition> {
        self.state.last_checked_at = Some(chrono::Utc::now());

        if self.initial_attempts_left > 0 {
            self.initial_attempts_left -= 1;
            return None;
        }

        self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);

        if self.state.connected && self.state.consecutive_failures >= self.failure_threshold {
            self.state.connected = false;
            Some(Transition::Disconnected)
        } else {
            None
        }
    }
}

// ============================================================================
// Health Probe Task
// ============================================================================

/// Periodic backend liveness monitor.
///
/// Publishes [`ConnectivityState`] snapshots on a `watch` channel and
/// discrete [`HealthSignal`]s on a `broadcast` channel: `Changed` only on
/// actual transitions, `Confirmed` (carrying the observed epoch) on every
/// success so dependents can re-synchronize without a transition.
pub struct HealthProbe {
    client: ApiClient,
    config: ProbeConfig,
    state_tx: watch::Sender<ConnectivityState>,
    signal_tx: broadcast::Sender<HealthSignal>,
    cancel: CancellationToken,
}

impl HealthProbe {
    pub fn new(client: ApiClient, config: ProbeConfig, cancel: CancellationToken) -> Self {
        let (state_tx, _) = watch::channel(ConnectivityState::default());
        let (signal_tx, _) = broadcast::channel(16);
        Self {
            client,
            config,
            state_tx,
            signal_tx,
            cancel,
        }
    }

    /// Subscribe to connectivity state snapshots.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectivityState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to discrete health signals.
    pub fn subscribe_signals(&self) -> broadcast::Receiver<HealthSignal> {
        self.signal_tx.subscribe()
    }

    /// Run the probe loop (call from `tokio::spawn`). Returns on
    /// cancellation.
    pub async fn run(self) {
        let mut tracker = ConnectivityTracker::new(
            self.config.initial_attempts,
            self.config.failure_threshold,
        );

        info!(
            backend = %self.client.base_url(),
            interval_ms = self.config.interval_connected_ms,
            "Health probe started"
        );

        loop {
            let timeout = if tracker.in_initial_phase() {
                self.config.initial_timeout()
            } else {
                self.config.probe_timeout()
            };

            match self.client.health(timeout).await {
                Ok(health) => {
                    if tracker.record_success() == Some(Transition::Connected) {
                        info!("Backend connection restored");
                        let _ = self.signal_tx.send(HealthSignal::Changed(true));
                    }
                    let _ = self
                        .signal_tx
                        .send(HealthSignal::Confirmed(health.server_start_time));
                }
                Err(e) => {
                    // Probe failures are never user-visible errors; only the
                    // aggregated boolean is observable.
                    match tracker.record_failure() {
                        Some(Transition::Disconnected) => {
                            warn!(error = %e, "Backend unreachable — connectivity lost");
                            let _ = self.signal_tx.send(HealthSignal::Changed(false));
                        }
                        _ => {
                            debug!(
                                error = %e,
                                failures = tracker.state().consecutive_failures,
                                "Probe failed"
                            );
                        }
                    }
                }
            }

            self.state_tx.send_replace(tracker.state().clone());

            let sleep_for = if tracker.state().connected {
                self.config.interval_connected()
            } else {
                self.config.interval_disconnected()
            };

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Health probe stopped");
                    break;
                }
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
    }
}
