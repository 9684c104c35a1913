//! bidwatch: resilient dashboard client for the job scraping & auto-bid backend
//!
//! Polls and streams job listings, tracks bot lifecycle state, and
//! reconciles optimistic client state with server truth across flaky
//! connections.
//!
//! ## Architecture
//!
//! - **HealthProbe**: backend liveness with asymmetric retry cadence
//! - **BotStatusPoller**: bot run/pause/metrics state with restart detection
//! - **JobStreamReconciler**: SSE push + snapshot merging with polling fallback
//!
//! Each component runs as one tokio task owning its state exclusively and
//! publishes outward on `watch`/`broadcast` channels; nothing shares
//! mutable state across tasks.

pub mod backend;
pub mod backoff;
pub mod bot;
pub mod config;
pub mod health;
pub mod jobs;
pub mod notify;
pub mod types;

// Re-export configuration
pub use config::DashboardConfig;

// Re-export commonly used types
pub use types::{
    BotAction, BotState, BotStatus, ConnectivityState, HealthSignal, JobFeed, JobRecord,
    RestartSignal, ServerEpoch, StreamEvent,
};

// Re-export components
pub use backend::{ApiClient, ApiError, JobStream};
pub use backoff::BackoffPolicy;
pub use bot::{ActionError, BotHandle, BotStatusPoller};
pub use health::{HealthProbe, RestartDetector};
pub use jobs::{JobFeedHandle, JobStreamReconciler, JobWorkingSet};
pub use notify::{LogNotifier, NotificationSink};
