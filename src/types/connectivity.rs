//! Connectivity state and liveness signals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Server Epoch
// ============================================================================

/// Opaque identifier for a specific run of the backend process.
///
/// The backend reports its boot time in `/health` as `server_start_time`.
/// The raw value is a float timestamp; it is carried here as a string so
/// comparisons are exact and the value stays opaque — the client only ever
/// asks "did it change?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ServerEpoch(String);

impl ServerEpoch {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerEpoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for ServerEpoch {
    /// Accepts either a JSON number (the backend's float boot time) or a
    /// string, normalising both to the exact textual form.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(s) => Ok(Self(s)),
            serde_json::Value::Number(n) => Ok(Self(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "expected string or number for server epoch, got {other}"
            ))),
        }
    }
}

// ============================================================================
// Connectivity State
// ============================================================================

/// Aggregated backend reachability, owned by the health probe.
///
/// `connected` flips to false only after the failure threshold is crossed
/// outside the startup grace phase; it flips to true on any single success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityState {
    /// Whether the backend is currently considered reachable
    pub connected: bool,
    /// Consecutive probe failures since the last success
    pub consecutive_failures: u32,
    /// Wall-clock time of the last completed probe (success or failure)
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Default for ConnectivityState {
    /// Starts optimistic: the client assumes the backend is reachable until
    /// the grace phase plus the failure threshold prove otherwise, so a
    /// fresh launch never flashes a disconnect banner.
    fn default() -> Self {
        Self {
            connected: true,
            consecutive_failures: 0,
            last_checked_at: None,
        }
    }
}

// ============================================================================
// Signals
// ============================================================================

/// Broadcast notifications from the health probe.
#[derive(Debug, Clone)]
pub enum HealthSignal {
    /// Connectivity transitioned (true = restored, false = lost).
    /// Emitted only on actual transitions.
    Changed(bool),
    /// A probe succeeded. Emitted on every success, transition or not, so
    /// dependents can re-synchronize even without a state change. Carries
    /// the epoch observed in the liveness payload.
    Confirmed(ServerEpoch),
}

/// Broadcast notification that the backend process restarted.
///
/// Client-held counters are meaningless across a restart; consumers should
/// discard derived state and resync from the next snapshot.
#[derive(Debug, Clone)]
pub struct RestartSignal {
    /// Epoch of the new backend process
    pub new_epoch: ServerEpoch,
}
