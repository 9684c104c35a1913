//! Bot lifecycle tracking.
//!
//! [`BotStatusPoller`] owns the authoritative [`BotStatus`](crate::types::BotStatus)
//! and is the only writer; [`BotHandle`] is the imperative surface for
//! user-initiated start/pause/resume/stop actions.

mod poller;

pub use poller::{ActionError, BotHandle, BotStatusPoller, PollerPhase};
