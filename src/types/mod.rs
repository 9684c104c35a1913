//! Shared data structures for the dashboard client
//!
//! This module defines the core types exchanged between components:
//! - Connectivity: ConnectivityState, ServerEpoch, HealthSignal
//! - Bot lifecycle: BotState, BotStatus, BotAction
//! - Job feed: JobRecord, StreamEvent, JobFeed

mod bot;
mod connectivity;
mod job;

pub use bot::*;
pub use connectivity::*;
pub use job::*;
