//! Bot lifecycle state and user actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Bot State
// ============================================================================

/// Scraper bot state as reported by `GET /api/bot/status`.
///
/// Mutated exclusively by the status poller, which overwrites the whole
/// struct from each server response. The only exception is the optimistic
/// write immediately after an acknowledged user action — and even that is
/// overwritten by the next poll. Reset to `default()` when a backend
/// restart is detected.
///
/// The endpoint also returns scrape settings (categories, keywords,
/// interval); those are CRUD plumbing and intentionally not modelled here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotState {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub jobs_found: u64,
    #[serde(default)]
    pub unread_count: u64,
    /// Bot uptime in seconds, as counted by the server
    #[serde(rename = "uptime", default)]
    pub uptime_secs: u64,
}

/// Bot state plus client-derived fields, as published to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BotStatus {
    #[serde(flatten)]
    pub state: BotState,
    /// Derived start timestamp (`now - uptime`), anchored when the bot is
    /// first seen running so elapsed-time display survives poll cadence
    /// changes. Cleared on stop and on restart detection.
    pub started_at: Option<DateTime<Utc>>,
}

// ============================================================================
// User Actions
// ============================================================================

/// User-initiated bot lifecycle actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotAction {
    Start,
    Stop,
    Pause,
    Resume,
}

impl BotAction {
    /// URL path segment for `POST /api/bot/{segment}`.
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Resume => "resume",
        }
    }
}

impl std::fmt::Display for BotAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path_segment())
    }
}
