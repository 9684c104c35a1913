//! Dashboard client configuration: all timing and sizing knobs as
//! operator-tunable TOML values.
//!
//! Every interval, timeout, and cap has a default in
//! [`defaults`](super::defaults), ensuring zero-change behaviour when no
//! config file is present.

use super::defaults;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a dashboard client instance.
///
/// Load with `DashboardConfig::load()` which searches:
/// 1. `$BIDWATCH_CONFIG` env var
/// 2. `./bidwatch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Backend endpoint and credential
    #[serde(default)]
    pub backend: BackendConfig,

    /// Health probe cadence and thresholds
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Bot status poll cadence
    #[serde(default)]
    pub poller: PollerConfig,

    /// Job feed stream / fallback tuning
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Backend endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the dashboard backend (no trailing slash required)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token for authenticated endpoints. `None` starts the client
    /// in the unauthenticated state until a token is supplied.
    #[serde(default)]
    pub token: Option<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
        }
    }
}

/// Health probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Probe interval while connected (ms)
    #[serde(default = "d_probe_connected_ms")]
    pub interval_connected_ms: u64,

    /// Probe interval while disconnected (ms)
    #[serde(default = "d_probe_disconnected_ms")]
    pub interval_disconnected_ms: u64,

    /// Startup grace-phase attempts that never count toward the threshold
    #[serde(default = "d_probe_initial_attempts")]
    pub initial_attempts: u32,

    /// Per-attempt timeout during the grace phase (secs)
    #[serde(default = "d_probe_initial_timeout")]
    pub initial_timeout_secs: u64,

    /// Per-attempt timeout outside the grace phase (secs)
    #[serde(default = "d_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Consecutive failures before declaring disconnected
    #[serde(default = "d_probe_threshold")]
    pub failure_threshold: u32,
}

fn d_probe_connected_ms() -> u64 {
    defaults::PROBE_INTERVAL_CONNECTED_MS
}
fn d_probe_disconnected_ms() -> u64 {
    defaults::PROBE_INTERVAL_DISCONNECTED_MS
}
fn d_probe_initial_attempts() -> u32 {
    defaults::PROBE_INITIAL_ATTEMPTS
}
fn d_probe_initial_timeout() -> u64 {
    defaults::PROBE_INITIAL_TIMEOUT_SECS
}
fn d_probe_timeout() -> u64 {
    defaults::PROBE_TIMEOUT_SECS
}
fn d_probe_threshold() -> u32 {
    defaults::PROBE_FAILURE_THRESHOLD
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_connected_ms: d_probe_connected_ms(),
            interval_disconnected_ms: d_probe_disconnected_ms(),
            initial_attempts: d_probe_initial_attempts(),
            initial_timeout_secs: d_probe_initial_timeout(),
            probe_timeout_secs: d_probe_timeout(),
            failure_threshold: d_probe_threshold(),
        }
    }
}

impl ProbeConfig {
    pub fn interval_connected(&self) -> Duration {
        Duration::from_millis(self.interval_connected_ms)
    }
    pub fn interval_disconnected(&self) -> Duration {
        Duration::from_millis(self.interval_disconnected_ms)
    }
    pub fn initial_timeout(&self) -> Duration {
        Duration::from_secs(self.initial_timeout_secs)
    }
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Bot status poller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Base poll interval (ms)
    #[serde(default = "d_poll_interval_ms")]
    pub interval_ms: u64,

    /// Backoff ceiling after repeated failures (secs)
    #[serde(default = "d_poll_backoff_cap")]
    pub backoff_cap_secs: u64,

    /// Per-request timeout (secs)
    #[serde(default = "d_poll_timeout")]
    pub request_timeout_secs: u64,
}

fn d_poll_interval_ms() -> u64 {
    defaults::STATUS_POLL_INTERVAL_MS
}
fn d_poll_backoff_cap() -> u64 {
    defaults::STATUS_POLL_BACKOFF_CAP_SECS
}
fn d_poll_timeout() -> u64 {
    defaults::STATUS_POLL_TIMEOUT_SECS
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: d_poll_interval_ms(),
            backoff_cap_secs: d_poll_backoff_cap(),
            request_timeout_secs: d_poll_timeout(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_secs)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Job feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Working set cap (records)
    #[serde(default = "d_feed_cap")]
    pub working_set_cap: usize,

    /// Fallback poll base interval (secs)
    #[serde(default = "d_fallback_interval")]
    pub fallback_interval_secs: u64,

    /// Fallback poll backoff ceiling (secs)
    #[serde(default = "d_fallback_cap")]
    pub fallback_backoff_cap_secs: u64,

    /// Random jitter added to each fallback poll (ms)
    #[serde(default = "d_fallback_jitter")]
    pub fallback_jitter_ms: u64,

    /// Minimum spacing between routine stream reconnect attempts (secs)
    #[serde(default = "d_stream_retry_min")]
    pub stream_retry_min_interval_secs: u64,
}

fn d_feed_cap() -> usize {
    defaults::JOB_WORKING_SET_CAP
}
fn d_fallback_interval() -> u64 {
    defaults::FALLBACK_POLL_INTERVAL_SECS
}
fn d_fallback_cap() -> u64 {
    defaults::FALLBACK_POLL_BACKOFF_CAP_SECS
}
fn d_fallback_jitter() -> u64 {
    defaults::FALLBACK_POLL_JITTER_MS
}
fn d_stream_retry_min() -> u64 {
    defaults::STREAM_RETRY_MIN_INTERVAL_SECS
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            working_set_cap: d_feed_cap(),
            fallback_interval_secs: d_fallback_interval(),
            fallback_backoff_cap_secs: d_fallback_cap(),
            fallback_jitter_ms: d_fallback_jitter(),
            stream_retry_min_interval_secs: d_stream_retry_min(),
        }
    }
}

impl FeedConfig {
    pub fn fallback_interval(&self) -> Duration {
        Duration::from_secs(self.fallback_interval_secs)
    }
    pub fn fallback_backoff_cap(&self) -> Duration {
        Duration::from_secs(self.fallback_backoff_cap_secs)
    }
    pub fn stream_retry_min_interval(&self) -> Duration {
        Duration::from_secs(self.stream_retry_min_interval_secs)
    }
}

// ============================================================================
// Loading
// ============================================================================

impl DashboardConfig {
    /// Load configuration using the standard search order:
    /// 1. `$BIDWATCH_CONFIG` environment variable
    /// 2. `./bidwatch.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("BIDWATCH_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from BIDWATCH_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from BIDWATCH_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "BIDWATCH_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("bidwatch.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./bidwatch.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./bidwatch.toml, using defaults");
                }
            }
        }

        Self::default()
    }

    /// Load and validate a config file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;

        for warning in config.validate() {
            warn!("Config: {}", warning);
        }

        Ok(config)
    }

    /// Range checks. Warnings are non-fatal; a questionable value is the
    /// operator's prerogative, a zero interval is almost certainly a typo.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.probe.interval_connected_ms == 0 {
            warnings.push("probe.interval_connected_ms is 0 — probe will spin".to_string());
        }
        if self.probe.failure_threshold == 0 {
            warnings.push(
                "probe.failure_threshold is 0 — every probe failure flips connectivity"
                    .to_string(),
            );
        }
        if self.poller.interval_ms == 0 {
            warnings.push("poller.interval_ms is 0 — status poll will spin".to_string());
        }
        if self.feed.working_set_cap == 0 {
            warnings.push("feed.working_set_cap is 0 — job feed will always be empty".to_string());
        }
        if self.backend.base_url.is_empty() {
            warnings.push("backend.base_url is empty".to_string());
        }

        warnings
    }
}

/// Config loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {0}: {1}")]
    Io(String, String),
    #[error("invalid TOML: {0}")]
    Parse(String),
}
