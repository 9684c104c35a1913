//! System-wide default constants.
//!
//! Centralises the timing and sizing knobs used across the client.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Health Probe
// ============================================================================

/// Probe interval while the backend is reachable (milliseconds).
pub const PROBE_INTERVAL_CONNECTED_MS: u64 = 1_500;

/// Probe interval while the backend is unreachable (milliseconds).
///
/// Faster than the connected cadence — detecting recovery quickly matters
/// more than reducing load on a server that is down anyway.
pub const PROBE_INTERVAL_DISCONNECTED_MS: u64 = 1_000;

/// Attempts in the startup grace phase that never count toward the
/// disconnect threshold. Absorbs the reconnect latency right after launch.
pub const PROBE_INITIAL_ATTEMPTS: u32 = 3;

/// Per-attempt timeout during the startup grace phase (seconds).
pub const PROBE_INITIAL_TIMEOUT_SECS: u64 = 10;

/// Per-attempt timeout outside the grace phase (seconds).
pub const PROBE_TIMEOUT_SECS: u64 = 3;

/// Consecutive failures required to declare the backend disconnected.
///
/// A single dropped probe must not flap the connectivity indicator.
pub const PROBE_FAILURE_THRESHOLD: u32 = 2;

// ============================================================================
// Bot Status Poller
// ============================================================================

/// Base interval between bot status polls (milliseconds).
pub const STATUS_POLL_INTERVAL_MS: u64 = 1_500;

/// Ceiling for status-poll backoff after repeated failures (seconds).
pub const STATUS_POLL_BACKOFF_CAP_SECS: u64 = 30;

/// Per-request timeout for status and liveness fetches (seconds).
pub const STATUS_POLL_TIMEOUT_SECS: u64 = 5;

/// Per-request timeout for user-initiated bot actions (seconds).
pub const BOT_ACTION_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Job Feed
// ============================================================================

/// Maximum number of job records held in the working set.
pub const JOB_WORKING_SET_CAP: usize = 50;

/// Base interval for the polling fallback when the stream is down (seconds).
pub const FALLBACK_POLL_INTERVAL_SECS: u64 = 5;

/// Ceiling for fallback-poll backoff after repeated failures (seconds).
pub const FALLBACK_POLL_BACKOFF_CAP_SECS: u64 = 30;

/// Random jitter added to each fallback poll (milliseconds).
pub const FALLBACK_POLL_JITTER_MS: u64 = 500;

/// Timeout for establishing the SSE job stream (seconds).
pub const STREAM_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Minimum spacing between stream reconnect attempts triggered by routine
/// probe confirmations (seconds). A `connectivity restored` transition
/// bypasses this and retries immediately.
pub const STREAM_RETRY_MIN_INTERVAL_SECS: u64 = 10;

/// Per-request timeout for the fallback `GET /api/jobs` fetch (seconds).
pub const FALLBACK_POLL_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Backoff
// ============================================================================

/// Maximum backoff multiplier exponent shared by all retry paths.
///
/// `2^5 = 32× base interval`, always further bounded by the per-path cap.
pub const RETRY_MAX_BACKOFF_EXPONENT: u32 = 5;

// ============================================================================
// HTTP Client
// ============================================================================

/// TCP connect timeout for all backend requests (seconds).
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
