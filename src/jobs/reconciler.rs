//! Job stream reconciler: merges push events and snapshots into the
//! working set, with a polling fallback for when the stream is down.
//!
//! The two data sources are mutually exclusive at any instant: the SSE
//! push channel is preferred; polling `GET /api/jobs` is the fallback.
//! Health probe signals decide when the push channel is worth retrying.
//! A backend restart discards the working set; whichever order the
//! reset and the next snapshot arrive in, wholesale replacement keeps
//! the set consistent.

use crate::backend::{ApiClient, ApiError, JobStream};
use crate::backoff::BackoffPolicy;
use crate::config::defaults::{FALLBACK_POLL_TIMEOUT_SECS, STREAM_CONNECT_TIMEOUT_SECS};
use crate::config::FeedConfig;
use crate::notify::NotificationSink;
use crate::types::{HealthSignal, JobFeed, JobRecord, RestartSignal, StreamEvent};
use rand::Rng;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::working_set::JobWorkingSet;

/// Buffered feed commands awaiting the reconciler task.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

// ============================================================================
// Handle
// ============================================================================

enum FeedCommand {
    MarkRead(String),
    MarkAllRead,
}

/// Imperative surface for read-state changes.
///
/// Fire-and-forget: the local flip is immediate, the backend write rides
/// behind it, and the next snapshot is authoritative either way.
#[derive(Clone)]
pub struct JobFeedHandle {
    cmd_tx: mpsc::Sender<FeedCommand>,
}

impl JobFeedHandle {
    pub async fn mark_read(&self, id: &str) {
        if self
            .cmd_tx
            .send(FeedCommand::MarkRead(id.to_string()))
            .await
            .is_err()
        {
            debug!(id, "mark_read dropped — reconciler stopped");
        }
    }

    pub async fn mark_all_read(&self) {
        if self.cmd_tx.send(FeedCommand::MarkAllRead).await.is_err() {
            debug!("mark_all_read dropped — reconciler stopped");
        }
    }
}

// ============================================================================
// Reconciler Task
// ============================================================================

/// Why stream consumption ended.
enum StreamExit {
    Cancelled,
    /// Server closed the stream or transport failed — fall back to polling
    Down,
    /// Backend restart detected — reconnect immediately for a fresh snapshot
    Restarted,
}

/// Why the fallback loop ended.
enum FallbackExit {
    Cancelled,
    /// Health signals say the push channel is worth retrying
    Recovered,
}

/// Single wake-up reason inside the select loops, so handlers can borrow
/// `self` mutably after the competing futures are gone.
enum Wake {
    Cancelled,
    Restart(Result<RestartSignal, broadcast::error::RecvError>),
    Health(Result<HealthSignal, broadcast::error::RecvError>),
    Command(Option<FeedCommand>),
    Event(Result<Option<StreamEvent>, ApiError>),
    Tick,
}

/// Owns the job working set and keeps it reconciled with the backend.
pub struct JobStreamReconciler {
    client: ApiClient,
    config: FeedConfig,
    auth_rx: watch::Receiver<Option<String>>,
    health_rx: broadcast::Receiver<HealthSignal>,
    restart_rx: broadcast::Receiver<RestartSignal>,
    feed_tx: watch::Sender<JobFeed>,
    cmd_rx: mpsc::Receiver<FeedCommand>,
    notifier: Box<dyn NotificationSink>,
    working_set: JobWorkingSet,
    cancel: CancellationToken,
    last_stream_attempt: Option<tokio::time::Instant>,
    commands_open: bool,
    restarts_open: bool,
    health_open: bool,
}

impl JobStreamReconciler {
    /// Build a reconciler and its command handle.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: ApiClient,
        config: FeedConfig,
        auth_rx: watch::Receiver<Option<String>>,
        health_rx: broadcast::Receiver<HealthSignal>,
        restart_rx: broadcast::Receiver<RestartSignal>,
        notifier: Box<dyn NotificationSink>,
        cancel: CancellationToken,
    ) -> (Self, JobFeedHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (feed_tx, _) = watch::channel(JobFeed::default());
        let working_set = JobWorkingSet::new(config.working_set_cap);

        let reconciler = Self {
            client,
            config,
            auth_rx,
            health_rx,
            restart_rx,
            feed_tx,
            cmd_rx,
            notifier,
            working_set,
            cancel,
            last_stream_attempt: None,
            commands_open: true,
            restarts_open: true,
            health_open: true,
        };
        (reconciler, JobFeedHandle { cmd_tx })
    }

    /// Subscribe to job feed snapshots.
    pub fn subscribe_feed(&self) -> watch::Receiver<JobFeed> {
        self.feed_tx.subscribe()
    }

    /// Run the reconciler (call from `tokio::spawn`). Returns on
    /// cancellation.
    pub async fn run(mut self) {
        info!(cap = self.config.working_set_cap, "Job stream reconciler started");

        loop {
            let Some(token) = self.wait_for_token().await else {
                break;
            };

            self.last_stream_attempt = Some(tokio::time::Instant::now());
            let connect_timeout = Duration::from_secs(STREAM_CONNECT_TIMEOUT_SECS);
            match self.client.open_job_stream(&token, connect_timeout).await {
                Ok(stream) => {
                    info!("Job stream connected");
                    match self.consume_stream(stream, &token).await {
                        StreamExit::Cancelled => break,
                        StreamExit::Restarted => continue,
                        StreamExit::Down => {}
                    }
                }
                Err(e) if e.is_auth() => {
                    debug!("Job stream rejected as unauthenticated");
                }
                Err(e) => {
                    debug!(error = %e, "Could not open job stream");
                }
            }

            match self.run_fallback(&token).await {
                FallbackExit::Cancelled => break,
                FallbackExit::Recovered => {}
            }
        }

        debug!("Job stream reconciler stopped");
    }

    /// Block until a token is available, servicing commands locally.
    async fn wait_for_token(&mut self) -> Option<String> {
        loop {
            if let Some(token) = self.auth_rx.borrow_and_update().clone() {
                return Some(token);
            }
            let wake = tokio::select! {
                _ = self.cancel.cancelled() => Wake::Cancelled,
                changed = self.auth_rx.changed() => {
                    if changed.is_err() {
                        Wake::Cancelled
                    } else {
                        Wake::Tick
                    }
                }
                cmd = self.cmd_rx.recv(), if self.commands_open => Wake::Command(cmd),
            };
            match wake {
                Wake::Cancelled => return None,
                Wake::Command(cmd) => self.handle_command(cmd, None).await,
                _ => {}
            }
        }
    }

    /// Consume the push channel until it dies, a restart invalidates it,
    /// or cancellation.
    async fn consume_stream(&mut self, mut stream: JobStream, token: &str) -> StreamExit {
        loop {
            let wake = tokio::select! {
                _ = self.cancel.cancelled() => Wake::Cancelled,
                signal = self.restart_rx.recv(), if self.restarts_open => Wake::Restart(signal),
                cmd = self.cmd_rx.recv(), if self.commands_open => Wake::Command(cmd),
                event = stream.next_event() => Wake::Event(event),
            };

            match wake {
                Wake::Cancelled => return StreamExit::Cancelled,
                Wake::Restart(signal) => {
                    if self.handle_restart(signal) {
                        return StreamExit::Restarted;
                    }
                }
                Wake::Command(cmd) => self.handle_command(cmd, Some(token)).await,
                Wake::Event(Ok(Some(StreamEvent::Snapshot { jobs }))) => {
                    self.apply_snapshot(jobs);
                }
                Wake::Event(Ok(Some(StreamEvent::NewJobs { jobs }))) => {
                    self.apply_delta(jobs);
                }
                Wake::Event(Ok(None)) => {
                    info!("Job stream closed by server — switching to polling fallback");
                    return StreamExit::Down;
                }
                Wake::Event(Err(e)) => {
                    warn!(error = %e, "Job stream failed — switching to polling fallback");
                    return StreamExit::Down;
                }
                Wake::Health(_) | Wake::Tick => {}
            }
        }
    }

    /// Poll `GET /api/jobs` on a jittered, backed-off cadence until
    /// health signals say the stream is worth retrying.
    async fn run_fallback(&mut self, token: &str) -> FallbackExit {
        info!(
            interval_secs = self.config.fallback_interval_secs,
            "Job polling fallback active"
        );
        let mut backoff = BackoffPolicy::new(
            self.config.fallback_interval(),
            self.config.fallback_backoff_cap(),
        );
        let poll_timeout = Duration::from_secs(FALLBACK_POLL_TIMEOUT_SECS);

        loop {
            match self.client.jobs(token, poll_timeout).await {
                Ok(jobs) => {
                    backoff.on_success();
                    self.apply_snapshot(jobs);
                }
                Err(e) if e.is_auth() => {
                    debug!("Jobs poll rejected as unauthenticated");
                }
                Err(e) => {
                    backoff.on_failure();
                    if backoff.failures() == 1 {
                        warn!(error = %e, "Jobs poll failed — backing off");
                    } else {
                        debug!(
                            error = %e,
                            failures = backoff.failures(),
                            next_delay = ?backoff.current_delay(),
                            "Jobs poll failed"
                        );
                    }
                }
            }

            let jitter =
                Duration::from_millis(rand::thread_rng().gen_range(0..=self.config.fallback_jitter_ms));
            let deadline = tokio::time::Instant::now() + backoff.current_delay() + jitter;

            loop {
                let wake = tokio::select! {
                    _ = self.cancel.cancelled() => Wake::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => Wake::Tick,
                    signal = self.health_rx.recv(), if self.health_open => Wake::Health(signal),
                    signal = self.restart_rx.recv(), if self.restarts_open => Wake::Restart(signal),
                    cmd = self.cmd_rx.recv(), if self.commands_open => Wake::Command(cmd),
                };

                match wake {
                    Wake::Cancelled => return FallbackExit::Cancelled,
                    Wake::Tick => break,
                    Wake::Command(cmd) => self.handle_command(cmd, Some(token)).await,
                    Wake::Restart(signal) => {
                        // Stay in fallback; the next poll resyncs the set
                        self.handle_restart(signal);
                    }
                    Wake::Health(Ok(HealthSignal::Changed(true))) => {
                        info!("Connectivity restored — retrying job stream");
                        return FallbackExit::Recovered;
                    }
                    Wake::Health(Ok(HealthSignal::Confirmed(_))) => {
                        if self.stream_retry_due() {
                            debug!("Probe confirmation — retrying job stream");
                            return FallbackExit::Recovered;
                        }
                    }
                    Wake::Health(Ok(HealthSignal::Changed(false))) => {}
                    Wake::Health(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                        debug!(skipped, "Health signal receiver lagged");
                    }
                    Wake::Health(Err(broadcast::error::RecvError::Closed)) => {
                        self.health_open = false;
                    }
                    Wake::Event(_) => {}
                }
            }
        }
    }

    /// Minimum spacing between stream retries triggered by routine probe
    /// confirmations, so a broken stream endpoint on a healthy backend
    /// cannot cause sub-second reconnect flapping.
    fn stream_retry_due(&self) -> bool {
        match self.last_stream_attempt {
            Some(at) => at.elapsed() >= self.config.stream_retry_min_interval(),
            None => true,
        }
    }

    /// Returns `true` if a restart was actually observed (vs. a lagged or
    /// closed channel).
    fn handle_restart(
        &mut self,
        signal: Result<RestartSignal, broadcast::error::RecvError>,
    ) -> bool {
        match signal {
            Ok(signal) => {
                info!(epoch = %signal.new_epoch, "Backend restarted — discarding job working set");
                if self.working_set.clear() {
                    self.publish();
                }
                true
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Missed signals still mean a restart happened
                debug!(skipped, "Restart signal receiver lagged");
                if self.working_set.clear() {
                    self.publish();
                }
                true
            }
            Err(broadcast::error::RecvError::Closed) => {
                self.restarts_open = false;
                false
            }
        }
    }

    async fn handle_command(&mut self, cmd: Option<FeedCommand>, token: Option<&str>) {
        let Some(cmd) = cmd else {
            self.commands_open = false;
            return;
        };
        match cmd {
            FeedCommand::MarkRead(id) => {
                if self.working_set.mark_read(&id) {
                    self.publish();
                    if let Some(token) = token {
                        // Persist behind the local flip; the next snapshot is
                        // authoritative regardless of the outcome.
                        let client = self.client.clone();
                        let token = token.to_string();
                        tokio::spawn(async move {
                            if let Err(e) = client.mark_job_read(&token, &id).await {
                                debug!(id, error = %e, "mark-read not persisted");
                            }
                        });
                    }
                }
            }
            FeedCommand::MarkAllRead => {
                if self.working_set.mark_all_read() {
                    self.publish();
                }
            }
        }
    }

    /// Wholesale snapshot replacement; publishes only on actual change.
    fn apply_snapshot(&mut self, jobs: Vec<JobRecord>) {
        if self.working_set.apply_snapshot(jobs) {
            self.publish();
        }
    }

    /// Delta merge; a delta with no unknown ids is a complete no-op.
    fn apply_delta(&mut self, jobs: Vec<JobRecord>) {
        let fresh = self.working_set.apply_delta(jobs);
        if fresh.is_empty() {
            return;
        }
        self.publish();

        let unread: Vec<JobRecord> = fresh.into_iter().filter(|j| !j.is_read).collect();
        if !unread.is_empty() {
            self.notifier.notify_new_jobs(&unread);
        }
    }

    fn publish(&self) {
        self.feed_tx.send_replace(JobFeed {
            jobs: self.working_set.records().to_vec(),
            unread_count: self.working_set.unread_count(),
        });
    }
}
