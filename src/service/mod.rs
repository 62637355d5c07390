//! Service layer: tracking logic and its scheduling.
//!
//! [`Orchestrator`] ticks every enabled server; each server's
//! [`TrackerDaemon`] drives its [`EventTracker`] through the event
//! lifecycle and records merged rankings.

pub mod daemon;
pub mod merge;
pub mod orchestrator;
pub mod registry;
pub mod tracker;

pub use daemon::{CycleOutcome, SkipReason, TrackerDaemon};
pub use merge::BorderChangeCache;
pub use orchestrator::Orchestrator;
pub use registry::TrackerRegistry;
pub use tracker::{EventTracker, RecordContext, RecordScope, RecordSummary};
