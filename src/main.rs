//! bidwatch: dashboard client for the job scraping & auto-bid backend.
//!
//! Connects to the backend, keeps bot state and the job feed in sync
//! across flaky connections, and renders state changes as log lines.
//!
//! # Usage
//!
//! ```bash
//! # Run against a local backend
//! cargo run --release
//!
//! # Point at a remote backend with a stored token
//! BIDWATCH_TOKEN=... bidwatch --backend-url http://dash.example.com:8000
//! ```
//!
//! # Environment Variables
//!
//! - `BIDWATCH_CONFIG`: Path to a TOML config file
//! - `BIDWATCH_TOKEN`: Bearer token for authenticated endpoints
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use bidwatch::backend::ApiClient;
use bidwatch::bot::BotStatusPoller;
use bidwatch::config::{self, DashboardConfig};
use bidwatch::health::HealthProbe;
use bidwatch::jobs::JobStreamReconciler;
use bidwatch::notify::LogNotifier;
use bidwatch::types::{BotStatus, ConnectivityState, JobFeed};

/// Name reported by a task when it completes, for supervisor logging.
type TaskName = &'static str;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "bidwatch")]
#[command(about = "Dashboard client for the job scraping & auto-bid backend")]
#[command(version)]
struct CliArgs {
    /// Override the backend base URL (default: from config)
    #[arg(short, long, value_name = "URL")]
    backend_url: Option<String>,

    /// Bearer token for authenticated endpoints
    #[arg(long, env = "BIDWATCH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Path to a TOML config file (bypasses the normal search order)
    #[arg(long, value_name = "PATH")]
    config: Option<String>,
}

// ============================================================================
// State Logger
// ============================================================================

/// Render published state changes as log lines (the terminal stands in
/// for the dashboard UI).
async fn run_state_logger(
    mut conn_rx: watch::Receiver<ConnectivityState>,
    mut bot_rx: watch::Receiver<BotStatus>,
    mut feed_rx: watch::Receiver<JobFeed>,
    cancel: CancellationToken,
) -> Result<TaskName> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok("state-logger"),
            changed = conn_rx.changed() => {
                if changed.is_err() {
                    return Ok("state-logger");
                }
                let state = conn_rx.borrow_and_update().clone();
                info!(
                    connected = state.connected,
                    failures = state.consecutive_failures,
                    "Connectivity"
                );
            }
            changed = bot_rx.changed() => {
                if changed.is_err() {
                    return Ok("state-logger");
                }
                let status = bot_rx.borrow_and_update().clone();
                info!(
                    running = status.state.running,
                    paused = status.state.paused,
                    jobs_found = status.state.jobs_found,
                    unread = status.state.unread_count,
                    "Bot status"
                );
            }
            changed = feed_rx.changed() => {
                if changed.is_err() {
                    return Ok("state-logger");
                }
                let feed = feed_rx.borrow_and_update().clone();
                info!(jobs = feed.jobs.len(), unread = feed.unread_count, "Job feed");
            }
        }
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Monitor spawned tasks; cancel everything if one fails.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let mut cfg = match &args.config {
        Some(path) => DashboardConfig::load_from_file(std::path::Path::new(path))?,
        None => DashboardConfig::load(),
    };
    if let Some(url) = args.backend_url {
        cfg.backend.base_url = url;
    }
    if args.token.is_some() {
        cfg.backend.token = args.token;
    }
    config::init(cfg);
    let cfg = config::get();

    info!("bidwatch starting");
    info!(backend = %cfg.backend.base_url, "Backend");

    let client = ApiClient::new(&cfg.backend.base_url)?;

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    // Auth signal: verify the stored token once at startup so the poller
    // starts in the right phase. A connectivity failure here must not
    // block startup; assume the token is good and let the poller sort
    // it out.
    let (auth_tx, auth_rx) = watch::channel(None::<String>);
    if let Some(token) = cfg.backend.token.clone() {
        match client.verify_token(&token, Duration::from_secs(10)).await {
            Ok(true) => {
                info!("Stored token verified");
                auth_tx.send_replace(Some(token));
            }
            Ok(false) => {
                warn!("Stored token rejected — starting unauthenticated");
            }
            Err(e) => {
                warn!(error = %e, "Could not verify token — proceeding with it anyway");
                auth_tx.send_replace(Some(token));
            }
        }
    } else {
        info!("No token configured — starting unauthenticated");
    }

    // Build components and wire their channels
    let probe = HealthProbe::new(client.clone(), cfg.probe.clone(), cancel_token.clone());
    let conn_rx = probe.subscribe_state();
    let health_rx = probe.subscribe_signals();

    let (poller, _bot_handle) = BotStatusPoller::new(
        client.clone(),
        cfg.poller.clone(),
        auth_rx.clone(),
        cancel_token.clone(),
    );
    let bot_rx = poller.subscribe_state();
    let restart_rx = poller.subscribe_restarts();

    let (reconciler, _feed_handle) = JobStreamReconciler::new(
        client,
        cfg.feed.clone(),
        auth_rx,
        health_rx,
        restart_rx,
        Box::new(LogNotifier),
        cancel_token.clone(),
    );
    let feed_rx = reconciler.subscribe_feed();

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    task_set.spawn(async move {
        probe.run().await;
        Ok("health-probe")
    });
    task_set.spawn(async move {
        poller.run().await;
        Ok("bot-status-poller")
    });
    task_set.spawn(async move {
        reconciler.run().await;
        Ok("job-stream-reconciler")
    });
    task_set.spawn(run_state_logger(
        conn_rx,
        bot_rx,
        feed_rx,
        cancel_token.clone(),
    ));

    run_supervisor(&mut task_set, cancel_token).await?;

    // Drain remaining tasks so their state is flushed before exit
    while task_set.join_next().await.is_some() {}

    info!("bidwatch shutdown complete");
    Ok(())
}
