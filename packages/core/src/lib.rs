//! Core domain types for the relq job queue.
//!
//! Everything here is pure: job records and their lock transitions, queue
//! statistics, events, errors and the snapshot wire format. Storage lives in
//! `relq_db`, coordination in `relq`.

mod error;
mod events;
mod job;
mod queue;
pub mod wire;

pub use error::QueueError;
pub use events::JobEvent;
pub use job::{
    Failure, HistoryEntry, JobId, JobRecord, JobState, MAX_TTL_SECS, NewJob, validate_ttl,
    validate_worker,
};
pub use queue::{QueueStats, validate_queue_name};
