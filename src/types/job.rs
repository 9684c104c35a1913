//! Job records and stream events.

use serde::{Deserialize, Serialize};

// ============================================================================
// Job Record
// ============================================================================

/// A single scraped job listing.
///
/// Identity is `id`; uniqueness holds within the working set. The display
/// fields are the subset of the backend's compressed job shape the
/// dashboard actually renders — unknown fields are ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub job_price: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub posted_time_relative: Option<String>,
}

impl JobRecord {
    /// Minimal record constructor used by tests and examples.
    pub fn new(id: impl Into<String>, is_read: bool) -> Self {
        Self {
            id: id.into(),
            is_read,
            title: String::new(),
            client: None,
            link: None,
            job_price: None,
            category: None,
            posted_time_relative: None,
        }
    }
}

// ============================================================================
// Stream Events
// ============================================================================

/// Events delivered on the SSE job stream.
///
/// `snapshot` replaces the working set wholesale; `new_jobs` carries only
/// records discovered since the last event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Snapshot { jobs: Vec<JobRecord> },
    NewJobs { jobs: Vec<JobRecord> },
}

// ============================================================================
// Published Feed
// ============================================================================

/// The job feed as published to observers: the ordered working set plus
/// the unread count derived from it (never from a server-side counter).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobFeed {
    pub jobs: Vec<JobRecord>,
    pub unread_count: usize,
}
