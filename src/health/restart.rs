//! Backend restart detection.

use crate::types::ServerEpoch;

/// Detects backend process restarts by comparing the boot epoch across
/// observations.
///
/// Client-held counters (jobs found, uptime, unread count) are meaningless
/// after a backend restart; this detector is the single source of truth
/// for "discard and resync" decisions.
#[derive(Debug, Default)]
pub struct RestartDetector {
    last_epoch: Option<ServerEpoch>,
}

impl RestartDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observed epoch.
    ///
    /// Returns `true` exactly when the observation differs from a
    /// previously stored epoch — the first observation is never a restart.
    /// After a restart is signalled the new epoch becomes the baseline.
    pub fn observe(&mut self, epoch: &ServerEpoch) -> bool {
        let restarted = match &self.last_epoch {
            Some(last) => last != epoch,
            None => false,
        };
        if self.last_epoch.as_ref() != Some(epoch) {
            self.last_epoch = Some(epoch.clone());
        }
        restarted
    }

    /// The current baseline epoch, if any has been observed.
    pub fn baseline(&self) -> Option<&ServerEpoch> {
        self.last_epoch.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_is_never_a_restart() {
        let mut detector = RestartDetector::new();
        assert!(!detector.observe(&ServerEpoch::new("100.5")));
        assert_eq!(detector.baseline().map(ServerEpoch::as_str), Some("100.5"));
    }

    #[test]
    fn stable_epoch_is_not_a_restart() {
        let mut detector = RestartDetector::new();
        detector.observe(&ServerEpoch::new("100.5"));
        assert!(!detector.observe(&ServerEpoch::new("100.5")));
        assert!(!detector.observe(&ServerEpoch::new("100.5")));
    }

    #[test]
    fn changed_epoch_signals_once_and_rebaselines() {
        let mut detector = RestartDetector::new();
        detector.observe(&ServerEpoch::new("100.5"));

        assert!(detector.observe(&ServerEpoch::new("230.0")));
        // The new epoch is now the baseline — no repeated signal
        assert!(!detector.observe(&ServerEpoch::new("230.0")));
        // A further change signals again
        assert!(detector.observe(&ServerEpoch::new("400.25")));
    }
}
