//! Errors surfaced by queue operations.

use thiserror::Error;

use crate::{JobId, JobState};

/// Errors returned by the queue engine.
///
/// `LockLost` and `NotFound` are deliberately separate: a worker that raced and
/// lost a job must be able to tell that apart from a job that never existed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueueError {
    /// The referenced job does not exist.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// The caller no longer holds (or never held) the lock on this job.
    #[error(
        "Lock lost: worker '{worker}' does not hold job {job_id} (state: {state}, holder: '{holder}')"
    )]
    LockLost {
        job_id: JobId,
        worker: String,
        holder: String,
        state: JobState,
    },

    /// A caller-supplied value was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store could not run the operation. Safe to retry.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl QueueError {
    /// Whether this error means another worker now owns the job.
    pub fn is_lock_lost(&self) -> bool {
        matches!(self, QueueError::LockLost { .. })
    }

    /// Whether retrying the whole operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueueError::StoreUnavailable(_))
    }
}
