//! Comment monitoring: session lifecycle, polling engine and event fan-out.
//!
//! - [`MonitorController`]: starts and stops the single active session
//! - [`PollingEngine`]: backfill followed by incremental polling
//! - [`dedup`]: ordering and high-water-mark classification of comment batches

pub mod controller;
pub mod dedup;
pub mod engine;
pub mod events;
pub mod session;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{
    DEFAULT_STOP_TIMEOUT, MonitorController, MonitorStatus, StartOutcome, StartRequest,
    StopOutcome,
};
pub use dedup::FeedScan;
pub use engine::{EngineConfig, PollingEngine};
pub use events::{CommentView, EventEnvelope, MonitorEvent, SessionEvents, StatusLevel};
pub use session::{HighWaterMark, MonitorSession, SessionPhase, SessionSnapshot};
pub use sink::{BatchSummary, BatchTarget, persist_batch};
