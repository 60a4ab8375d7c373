//! Job domain types and the lock state machine.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::QueueError;
use crate::wire::{epoch_seconds, epoch_seconds_option, tag_set};

/// Largest lock window accepted, in either direction (100 years).
pub const MAX_TTL_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Claimable by the next pop.
    #[default]
    Waiting,
    /// Held by a worker until `expires`.
    Locked,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Failed,
}

impl JobState {
    /// Whether the job still counts towards its queue's length.
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Waiting | JobState::Locked)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Locked => "locked",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobState::Waiting),
            "locked" => Ok(JobState::Locked),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(QueueError::InvalidArgument(format!("unknown job state: {other}"))),
        }
    }
}

/// One episode of a job belonging to a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub queue: String,
    #[serde(with = "epoch_seconds")]
    pub put: DateTime<Utc>,
    #[serde(default, with = "epoch_seconds_option")]
    pub popped: Option<DateTime<Utc>>,
    #[serde(default)]
    pub worker: String,
    #[serde(default, with = "epoch_seconds_option")]
    pub completed: Option<DateTime<Utc>>,
}

impl HistoryEntry {
    /// A fresh episode: put on `queue` at `at`, not yet popped.
    pub fn put(queue: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            queue: queue.into(),
            put: at,
            popped: None,
            worker: String::new(),
            completed: None,
        }
    }
}

/// Why and by whom a job was failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub reason: String,
    pub worker: String,
    #[serde(with = "epoch_seconds")]
    pub at: DateTime<Utc>,
}

/// A producer's submission, consumed by `push`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub id: JobId,
    pub data: serde_json::Value,
    pub priority: i32,
    pub tags: BTreeSet<String>,
}

impl NewJob {
    /// Create a submission with a fresh id, priority 0 and no tags.
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            id: JobId::new(),
            data,
            priority: 0,
            tags: BTreeSet::new(),
        }
    }

    /// Reuse an existing id (re-push).
    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }

    /// Set the priority for this job.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add tags to this job.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Job data must be a mapping.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.data.is_object() {
            Ok(())
        } else {
            Err(QueueError::InvalidArgument(format!(
                "job {} data must be a JSON object",
                self.id
            )))
        }
    }
}

/// Validate a lock window in seconds.
pub fn validate_ttl(ttl: i64) -> Result<i64, QueueError> {
    if ttl.unsigned_abs() > MAX_TTL_SECS.unsigned_abs() {
        return Err(QueueError::InvalidArgument(format!(
            "ttl {ttl}s is outside +/-{MAX_TTL_SECS}s"
        )));
    }
    Ok(ttl)
}

/// Validate a worker identity. The empty string means "unlocked".
pub fn validate_worker(worker: &str) -> Result<(), QueueError> {
    if worker.is_empty() {
        return Err(QueueError::InvalidArgument("worker id must not be empty".into()));
    }
    Ok(())
}

/// A job as stored, and the snapshot handed to callers.
///
/// Serializes to the client wire format: timestamps as Unix seconds,
/// empty tags as `{}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub data: serde_json::Value,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, with = "tag_set")]
    pub tags: BTreeSet<String>,
    pub queue: String,
    #[serde(default)]
    pub worker: String,
    #[serde(default)]
    pub state: JobState,
    #[serde(default, with = "epoch_seconds_option")]
    pub expires: Option<DateTime<Utc>>,
    /// Lock window in seconds, applied at every claim and renewal.
    pub ttl: i64,
    /// Store-assigned arrival order; ties in priority pop in this order.
    #[serde(default)]
    pub sequence: u64,
    pub history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl JobRecord {
    /// Create a waiting job on `queue` from a submission.
    pub fn enqueue(new: NewJob, queue: &str, ttl: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            data: new.data,
            priority: new.priority,
            tags: new.tags,
            queue: queue.to_string(),
            worker: String::new(),
            state: JobState::Waiting,
            expires: None,
            ttl,
            sequence: 0,
            history: vec![HistoryEntry::put(queue, now)],
            failure: None,
        }
    }

    /// Apply a re-push of an existing job.
    ///
    /// Returns `true` when the job starts a new episode on `queue` and needs a
    /// fresh arrival sequence; `false` when it was already waiting there.
    pub fn repush(
        &mut self,
        new: NewJob,
        queue: &str,
        ttl: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, QueueError> {
        if self.state == JobState::Locked {
            return Err(QueueError::InvalidArgument(format!(
                "job {} is locked by '{}' and cannot be re-pushed",
                self.id, self.worker
            )));
        }

        self.data = new.data;
        self.tags = new.tags;
        self.priority = new.priority;
        self.ttl = ttl;

        if self.state == JobState::Waiting && self.queue == queue {
            return Ok(false);
        }

        self.queue = queue.to_string();
        self.state = JobState::Waiting;
        self.worker.clear();
        self.expires = None;
        self.failure = None;
        self.history.push(HistoryEntry::put(queue, now));
        Ok(true)
    }

    /// Locked, and the lock ran out before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Locked && self.expires.is_some_and(|expires| expires < now)
    }

    /// Eligible for the next pop at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Waiting || self.is_expired(now)
    }

    /// Expiry of a lock taken or renewed at `now`.
    pub fn lock_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window = TimeDelta::seconds(self.ttl.clamp(-MAX_TTL_SECS, MAX_TTL_SECS));
        now.checked_add_signed(window).unwrap_or(now)
    }

    /// Move an expired lock back to waiting. Returns the worker that lost it.
    pub fn reclaim(&mut self, now: DateTime<Utc>) -> String {
        let previous = std::mem::take(&mut self.worker);
        self.state = JobState::Waiting;
        self.expires = None;
        self.history.push(HistoryEntry::put(self.queue.clone(), now));
        previous
    }

    /// Lock the job for `worker`. Caller has checked it is claimable.
    pub fn claim(&mut self, worker: &str, now: DateTime<Utc>) {
        self.state = JobState::Locked;
        self.worker = worker.to_string();
        self.expires = Some(self.lock_expiry(now));
        let entry = self.current_episode(now);
        entry.popped = Some(now);
        entry.worker = worker.to_string();
    }

    /// Extend the lock held by `worker`. Returns the new expiry.
    pub fn renew(&mut self, worker: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, QueueError> {
        self.ensure_held_by(worker)?;
        let expires = self.lock_expiry(now);
        self.expires = Some(expires);
        Ok(expires)
    }

    /// Finish the job successfully, closing the current history episode.
    pub fn complete(&mut self, worker: &str, now: DateTime<Utc>) -> Result<(), QueueError> {
        self.ensure_held_by(worker)?;
        self.state = JobState::Completed;
        self.worker.clear();
        self.expires = None;
        self.current_episode(now).completed = Some(now);
        Ok(())
    }

    /// Finish the job with a failure. The history episode stays open.
    pub fn fail(&mut self, worker: &str, reason: &str, now: DateTime<Utc>) -> Result<(), QueueError> {
        self.ensure_held_by(worker)?;
        self.state = JobState::Failed;
        self.failure = Some(Failure {
            reason: reason.to_string(),
            worker: std::mem::take(&mut self.worker),
            at: now,
        });
        self.expires = None;
        Ok(())
    }

    /// Pop order: higher priority first, then earlier arrival.
    pub fn claim_order(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }

    fn ensure_held_by(&self, worker: &str) -> Result<(), QueueError> {
        if self.state == JobState::Locked && self.worker == worker {
            return Ok(());
        }
        Err(QueueError::LockLost {
            job_id: self.id,
            worker: worker.to_string(),
            holder: self.worker.clone(),
            state: self.state,
        })
    }

    fn current_episode(&mut self, now: DateTime<Utc>) -> &mut HistoryEntry {
        if self.history.is_empty() {
            self.history.push(HistoryEntry::put(self.queue.clone(), now));
        }
        let last = self.history.len() - 1;
        &mut self.history[last]
    }
}
