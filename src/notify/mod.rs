//! Outbound notification seam.
//!
//! The real notifier (desktop/native notifications) is an external
//! collaborator; the reconciler only needs somewhere to hand a batch of
//! newly arrived jobs. One call per delta event, never per job.

use crate::types::JobRecord;
use tracing::info;

/// Sink for batched new-job notifications.
pub trait NotificationSink: Send + Sync + 'static {
    /// Called once per delta event that actually added records.
    fn notify_new_jobs(&self, jobs: &[JobRecord]);
}

/// Default sink: a structured log line per batch.
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify_new_jobs(&self, jobs: &[JobRecord]) {
        let titles: Vec<&str> = jobs.iter().map(|j| j.title.as_str()).take(3).collect();
        info!(
            count = jobs.len(),
            sample = ?titles,
            "New jobs discovered"
        );
    }
}
