//! Event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Events emitted after a queue operation commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// A job was put (or re-put) on a queue.
    Pushed {
        job_id: JobId,
        queue: String,
        priority: i32,
        timestamp: DateTime<Utc>,
    },
    /// A worker claimed a job.
    Popped {
        job_id: JobId,
        queue: String,
        worker: String,
        expires: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    /// An expired lock was taken away from its worker.
    LockLost {
        job_id: JobId,
        queue: String,
        worker: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker extended its lock.
    Renewed {
        job_id: JobId,
        queue: String,
        worker: String,
        expires: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    /// A job completed successfully.
    Completed {
        job_id: JobId,
        queue: String,
        worker: String,
        timestamp: DateTime<Utc>,
    },
    /// A job failed.
    Failed {
        job_id: JobId,
        queue: String,
        worker: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// A job was removed.
    Deleted {
        job_id: JobId,
        queue: String,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::Pushed { timestamp, .. }
            | JobEvent::Popped { timestamp, .. }
            | JobEvent::LockLost { timestamp, .. }
            | JobEvent::Renewed { timestamp, .. }
            | JobEvent::Completed { timestamp, .. }
            | JobEvent::Failed { timestamp, .. }
            | JobEvent::Deleted { timestamp, .. } => *timestamp,
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::Pushed { job_id, .. }
            | JobEvent::Popped { job_id, .. }
            | JobEvent::LockLost { job_id, .. }
            | JobEvent::Renewed { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. }
            | JobEvent::Deleted { job_id, .. } => *job_id,
        }
    }

    pub fn queue(&self) -> &str {
        match self {
            JobEvent::Pushed { queue, .. }
            | JobEvent::Popped { queue, .. }
            | JobEvent::LockLost { queue, .. }
            | JobEvent::Renewed { queue, .. }
            | JobEvent::Completed { queue, .. }
            | JobEvent::Failed { queue, .. }
            | JobEvent::Deleted { queue, .. } => queue,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::Pushed { job_id, queue, .. } => format!("Job {job_id} put on '{queue}'"),
            JobEvent::Popped { job_id, worker, .. } => format!("Job {job_id} popped by {worker}"),
            JobEvent::LockLost { job_id, worker, .. } => {
                format!("Job {job_id} lock expired for {worker}")
            }
            JobEvent::Renewed {
                job_id, expires, ..
            } => format!("Job {job_id} lock renewed until {expires}"),
            JobEvent::Completed { job_id, worker, .. } => {
                format!("Job {job_id} completed by {worker}")
            }
            JobEvent::Failed {
                job_id, reason, ..
            } => format!("Job {job_id} failed: {reason}"),
            JobEvent::Deleted { job_id, .. } => format!("Job {job_id} deleted"),
        }
    }
}
