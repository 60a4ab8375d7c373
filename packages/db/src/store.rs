//! The atomic store contract every queue operation runs against.
//!
//! Reads hand back records tagged with a revision. A commit applies a batch of
//! writes all-or-nothing, and only if every record it touches still carries the
//! revision the caller read. Callers re-run their read/compute/commit script
//! when a commit reports [`Commit::Conflict`].

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use relq_core::{JobId, JobRecord, QueueError, QueueStats};
use thiserror::Error;
use ulid::Ulid;

/// A value together with the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub revision: Ulid,
    pub value: T,
}

/// One write inside a commit.
#[derive(Debug, Clone)]
pub enum Write {
    /// Insert or replace a job. `expected: None` means the job must not exist yet.
    /// With `resequence` the store assigns the job the next arrival sequence.
    Put {
        expected: Option<Ulid>,
        job: JobRecord,
        resequence: bool,
    },
    /// Remove a job that still carries `expected`.
    Delete { expected: Ulid, id: JobId },
}

impl Write {
    pub fn job_id(&self) -> JobId {
        match self {
            Write::Put { job, .. } => job.id,
            Write::Delete { id, .. } => *id,
        }
    }
}

/// Outcome of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    Applied,
    /// At least one record changed since it was read; nothing was written.
    Conflict,
}

/// Pop candidates for one queue, each list in claim order.
#[derive(Debug, Clone, Default)]
pub struct Claimable {
    /// Locked jobs whose lock ran out before the read instant.
    pub expired: Vec<Versioned<JobRecord>>,
    pub waiting: Vec<Versioned<JobRecord>>,
}

/// Store-level failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(#[from] surrealdb::Error),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for QueueError {
    fn from(err: StoreError) -> Self {
        QueueError::StoreUnavailable(err.to_string())
    }
}

/// Backing storage for jobs and queue options.
pub trait AtomicStore: Send + Sync + 'static {
    /// The store's notion of the current instant.
    fn now(&self) -> DateTime<Utc>;

    fn load_job(
        &self,
        id: &JobId,
    ) -> impl Future<Output = Result<Option<Versioned<JobRecord>>, StoreError>> + Send;

    /// Up to `limit` expired locks and up to `limit` waiting jobs of `queue`.
    fn load_claimable(
        &self,
        queue: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> impl Future<Output = Result<Claimable, StoreError>> + Send;

    /// Every job whose `queue` is `queue`, in any state.
    fn load_queue(
        &self,
        queue: &str,
    ) -> impl Future<Output = Result<Vec<Versioned<JobRecord>>, StoreError>> + Send;

    fn count_by_state(
        &self,
        queue: &str,
    ) -> impl Future<Output = Result<QueueStats, StoreError>> + Send;

    /// Apply `writes` atomically if every revision guard still holds.
    fn commit(&self, writes: Vec<Write>) -> impl Future<Output = Result<Commit, StoreError>> + Send;

    fn config_get(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    fn config_all(&self) -> impl Future<Output = Result<BTreeMap<String, String>, StoreError>> + Send;

    /// Set an option, or delete it with `None`.
    fn config_set(
        &self,
        name: &str,
        value: Option<&str>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
