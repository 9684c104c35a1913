//! Job feed reconciliation.
//!
//! [`JobWorkingSet`] is the bounded, ordered collection of job records;
//! [`JobStreamReconciler`] keeps it in sync with the backend by merging
//! SSE push events with snapshots, falling back to polling when the
//! stream is unavailable.

mod reconciler;
mod working_set;

pub use reconciler::{JobFeedHandle, JobStreamReconciler};
pub use working_set::JobWorkingSet;
