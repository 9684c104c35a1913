//! Backend liveness monitoring.
//!
//! [`HealthProbe`] owns the connectivity state machine and publishes
//! reachability to the rest of the client; [`RestartDetector`] turns the
//! server-reported boot epoch into restart events.

mod probe;
mod restart;

pub use probe::{ConnectivityTracker, HealthProbe, Transition};
pub use restart::RestartDetector;
