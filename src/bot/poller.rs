//! Bot status poller: auth-gated polling with restart detection.
//!
//! Each cycle observes the server epoch from the liveness payload before
//! fetching bot state, so a backend restart resets client-held counters
//! before they can be displayed as stale truth. Cadence backs off
//! exponentially on connectivity failures and snaps straight back to the
//! base interval on the first success.

use crate::backend::{ApiClient, ApiError};
use crate::backoff::BackoffPolicy;
use crate::config::PollerConfig;
use crate::health::RestartDetector;
use crate::types::{BotAction, BotState, BotStatus, RestartSignal};
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Buffered user commands awaiting the poller task.
const COMMAND_CHANNEL_CAPACITY: usize = 8;

// ============================================================================
// Errors
// ============================================================================

/// A user-initiated bot action failed.
///
/// Surfaced exactly once through the command's reply channel; never
/// affects polling cadence.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("bot action rejected: {0}")]
    Rejected(String),
    #[error("not authenticated")]
    Unauthenticated,
    #[error("poller is shut down")]
    Shutdown,
    #[error(transparent)]
    Api(#[from] ApiError),
}

// ============================================================================
// Poller Phase
// ============================================================================

/// The poller's lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerPhase {
    /// Not yet running (or cancelled)
    Idle,
    /// No credential present — the status endpoint is never called in
    /// this phase, polling it would be a guaranteed failure
    PollingUnauthenticated,
    /// Credential present — full poll cycles
    PollingAuthenticated,
}

impl std::fmt::Display for PollerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::PollingUnauthenticated => write!(f, "polling-unauthenticated"),
            Self::PollingAuthenticated => write!(f, "polling-authenticated"),
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

struct BotCommand {
    action: BotAction,
    reply: oneshot::Sender<Result<(), ActionError>>,
}

/// Imperative surface for user-initiated bot actions.
///
/// Commands are executed by the poller task itself, so action
/// acknowledgments and poll results can never interleave on the shared
/// state.
#[derive(Clone)]
pub struct BotHandle {
    cmd_tx: mpsc::Sender<BotCommand>,
}

impl BotHandle {
    pub async fn start(&self) -> Result<(), ActionError> {
        self.dispatch(BotAction::Start).await
    }

    pub async fn stop(&self) -> Result<(), ActionError> {
        self.dispatch(BotAction::Stop).await
    }

    pub async fn pause(&self) -> Result<(), ActionError> {
        self.dispatch(BotAction::Pause).await
    }

    pub async fn resume(&self) -> Result<(), ActionError> {
        self.dispatch(BotAction::Resume).await
    }

    async fn dispatch(&self, action: BotAction) -> Result<(), ActionError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(BotCommand { action, reply })
            .await
            .map_err(|_| ActionError::Shutdown)?;
        rx.await.map_err(|_| ActionError::Shutdown)?
    }
}

// ============================================================================
// Poller Task
// ============================================================================

/// Polls bot run/pause/metrics state and publishes it on a `watch`
/// channel. Applies [`RestartDetector`] each cycle and broadcasts a
/// [`RestartSignal`] when the backend process changed.
pub struct BotStatusPoller {
    client: ApiClient,
    config: PollerConfig,
    auth_rx: watch::Receiver<Option<String>>,
    state_tx: watch::Sender<BotStatus>,
    restart_tx: broadcast::Sender<RestartSignal>,
    cmd_rx: mpsc::Receiver<BotCommand>,
    cancel: CancellationToken,
    detector: RestartDetector,
    backoff: BackoffPolicy,
    started_at: Option<chrono::DateTime<Utc>>,
    phase: PollerPhase,
    cycle: u64,
}

impl BotStatusPoller {
    /// Build a poller and its command handle.
    pub fn new(
        client: ApiClient,
        config: PollerConfig,
        auth_rx: watch::Receiver<Option<String>>,
        cancel: CancellationToken,
    ) -> (Self, BotHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(BotStatus::default());
        let (restart_tx, _) = broadcast::channel(8);
        let backoff = BackoffPolicy::new(config.interval(), config.backoff_cap());

        let poller = Self {
            client,
            config,
            auth_rx,
            state_tx,
            restart_tx,
            cmd_rx,
            cancel,
            detector: RestartDetector::new(),
            backoff,
            started_at: None,
            phase: PollerPhase::Idle,
            cycle: 0,
        };
        (poller, BotHandle { cmd_tx })
    }

    /// Subscribe to bot status snapshots.
    pub fn subscribe_state(&self) -> watch::Receiver<BotStatus> {
        self.state_tx.subscribe()
    }

    /// Subscribe to backend restart signals.
    pub fn subscribe_restarts(&self) -> broadcast::Receiver<RestartSignal> {
        self.restart_tx.subscribe()
    }

    /// Run the poll loop (call from `tokio::spawn`). Returns on
    /// cancellation.
    pub async fn run(mut self) {
        info!(interval_ms = self.config.interval_ms, "Bot status poller started");
        let mut commands_open = true;

        loop {
            let token = self.auth_rx.borrow_and_update().clone();

            let Some(token) = token else {
                self.set_phase(PollerPhase::PollingUnauthenticated);
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    changed = self.auth_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    cmd = self.cmd_rx.recv(), if commands_open => {
                        match cmd {
                            Some(cmd) => {
                                let _ = cmd.reply.send(Err(ActionError::Unauthenticated));
                            }
                            None => commands_open = false,
                        }
                    }
                }
                continue;
            };

            self.set_phase(PollerPhase::PollingAuthenticated);
            self.cycle += 1;
            self.poll_once(&token).await;

            // Sleep out the (possibly backed-off) interval, servicing user
            // commands and token changes without resetting the deadline.
            let deadline = tokio::time::Instant::now() + self.backoff.current_delay();
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        self.set_phase(PollerPhase::Idle);
                        return;
                    }
                    _ = tokio::time::sleep_until(deadline) => break,
                    changed = self.auth_rx.changed() => {
                        if changed.is_err() {
                            self.set_phase(PollerPhase::Idle);
                            return;
                        }
                        break;
                    }
                    cmd = self.cmd_rx.recv(), if commands_open => {
                        match cmd {
                            Some(cmd) => self.handle_command(&token, cmd).await,
                            None => commands_open = false,
                        }
                    }
                }
            }
        }

        self.set_phase(PollerPhase::Idle);
    }

    fn set_phase(&mut self, phase: PollerPhase) {
        if self.phase != phase {
            info!(from = %self.phase, to = %phase, "Poller phase changed");
            self.phase = phase;
        }
    }

    /// One poll cycle: liveness + restart check, then authoritative
    /// status overwrite.
    async fn poll_once(&mut self, token: &str) {
        let timeout = self.config.request_timeout();

        match self.client.health(timeout).await {
            Ok(health) => {
                if self.detector.observe(&health.server_start_time) {
                    info!(
                        epoch = %health.server_start_time,
                        "Backend restart detected — resetting bot state"
                    );
                    self.started_at = None;
                    self.state_tx.send_replace(BotStatus::default());
                    let _ = self.restart_tx.send(RestartSignal {
                        new_epoch: health.server_start_time.clone(),
                    });
                }
            }
            Err(e) => {
                self.note_failure(&e, "liveness fetch failed");
                return;
            }
        }

        match self.client.bot_status(token, timeout).await {
            Ok(state) => {
                self.backoff.on_success();
                self.integrate(state);
            }
            Err(e) if e.is_auth() => {
                // Terminal for this cycle: skip, don't retry, and leave the
                // token decision to the auth layer upstream.
                debug!(cycle = self.cycle, "Status poll rejected as unauthenticated");
            }
            Err(e) => self.note_failure(&e, "status poll failed"),
        }
    }

    /// Overwrite the published status wholesale from a server response,
    /// anchoring the derived start timestamp on the not-running → running
    /// edge so elapsed-time display survives poll cadence changes.
    fn integrate(&mut self, state: BotState) {
        if state.running {
            if self.started_at.is_none() {
                let uptime = chrono::Duration::seconds(state.uptime_secs as i64);
                self.started_at = Some(Utc::now() - uptime);
            }
        } else {
            self.started_at = None;
        }

        let status = BotStatus {
            state,
            started_at: self.started_at,
        };
        self.state_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    /// Connectivity failures drive backoff and are logged once per streak.
    fn note_failure(&mut self, error: &ApiError, what: &str) {
        self.backoff.on_failure();
        if self.backoff.failures() == 1 {
            warn!(error = %error, "{what} — backing off");
        } else {
            debug!(
                error = %error,
                failures = self.backoff.failures(),
                next_delay = ?self.backoff.current_delay(),
                "{what}"
            );
        }
    }

    async fn handle_command(&mut self, token: &str, cmd: BotCommand) {
        let result = self.execute_action(token, cmd.action).await;
        if let Err(ref e) = result {
            debug!(action = %cmd.action, error = %e, "Bot action failed");
        }
        let _ = cmd.reply.send(result);
    }

    async fn execute_action(
        &mut self,
        token: &str,
        action: BotAction,
    ) -> Result<(), ActionError> {
        match self.client.bot_action(token, action).await {
            Ok(resp) if resp.success => {
                info!(action = %action, "Bot action acknowledged");
                self.apply_optimistic(action);
                Ok(())
            }
            Ok(resp) => Err(ActionError::Rejected(
                resp.message.unwrap_or_else(|| "no reason given".to_string()),
            )),
            Err(e) => Err(ActionError::Api(e)),
        }
    }

    /// Optimistically reflect an acknowledged action. The next poll is
    /// authoritative and overwrites these fields.
    fn apply_optimistic(&mut self, action: BotAction) {
        if matches!(action, BotAction::Stop) {
            self.started_at = None;
        }
        let started_at = self.started_at;

        self.state_tx.send_if_modified(|status| {
            let s = &mut status.state;
            match action {
                BotAction::Start => {
                    s.running = true;
                    s.paused = false;
                }
                BotAction::Stop => {
                    s.running = false;
                    s.paused = false;
                    s.uptime_secs = 0;
                }
                BotAction::Pause => s.paused = true,
                BotAction::Resume => s.paused = false,
            }
            status.started_at = started_at;
            true
        });
    }
}
