//! In-process store backed by a mutex-guarded map.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relq_core::{JobId, JobRecord, JobState, QueueStats};
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::{AtomicStore, Claimable, Clock, Commit, StoreError, SystemClock, Versioned, Write};

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<JobId, Versioned<JobRecord>>,
    config: BTreeMap<String, String>,
    next_sequence: u64,
}

/// Store that keeps everything in memory. Commits are serialised by one mutex.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock: Arc::new(clock),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

fn in_claim_order(mut jobs: Vec<Versioned<JobRecord>>, limit: usize) -> Vec<Versioned<JobRecord>> {
    jobs.sort_by(|a, b| a.value.claim_order(&b.value));
    jobs.truncate(limit);
    jobs
}

impl AtomicStore for MemoryStore {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn load_job(&self, id: &JobId) -> Result<Option<Versioned<JobRecord>>, StoreError> {
        Ok(self.inner.lock().await.jobs.get(id).cloned())
    }

    async fn load_claimable(
        &self,
        queue: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Claimable, StoreError> {
        let inner = self.inner.lock().await;
        let (mut expired, mut waiting) = (Vec::new(), Vec::new());
        for entry in inner.jobs.values().filter(|e| e.value.queue == queue) {
            if entry.value.is_expired(now) {
                expired.push(entry.clone());
            } else if entry.value.state == JobState::Waiting {
                waiting.push(entry.clone());
            }
        }
        Ok(Claimable {
            expired: in_claim_order(expired, limit),
            waiting: in_claim_order(waiting, limit),
        })
    }

    async fn load_queue(&self, queue: &str) -> Result<Vec<Versioned<JobRecord>>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .jobs
            .values()
            .filter(|e| e.value.queue == queue)
            .cloned()
            .collect())
    }

    async fn count_by_state(&self, queue: &str) -> Result<QueueStats, StoreError> {
        let inner = self.inner.lock().await;
        let mut stats = QueueStats::default();
        for entry in inner.jobs.values().filter(|e| e.value.queue == queue) {
            stats.record(entry.value.state);
        }
        Ok(stats)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<Commit, StoreError> {
        let mut inner = self.inner.lock().await;

        for write in &writes {
            let current = inner.jobs.get(&write.job_id()).map(|e| e.revision);
            let expected = match write {
                Write::Put { expected, .. } => *expected,
                Write::Delete { expected, .. } => Some(*expected),
            };
            if current != expected {
                tracing::debug!(job_id = %write.job_id(), "revision guard failed");
                return Ok(Commit::Conflict);
            }
        }

        for write in writes {
            match write {
                Write::Put {
                    mut job,
                    resequence,
                    ..
                } => {
                    if resequence {
                        inner.next_sequence += 1;
                        job.sequence = inner.next_sequence;
                    }
                    let entry = Versioned {
                        revision: Ulid::new(),
                        value: job,
                    };
                    inner.jobs.insert(entry.value.id, entry);
                }
                Write::Delete { id, .. } => {
                    inner.jobs.remove(&id);
                }
            }
        }

        Ok(Commit::Applied)
    }

    async fn config_get(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().await.config.get(name).cloned())
    }

    async fn config_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self.inner.lock().await.config.clone())
    }

    async fn config_set(&self, name: &str, value: Option<&str>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        match value {
            Some(value) => inner.config.insert(name.to_string(), value.to_string()),
            None => inner.config.remove(name),
        };
        Ok(())
    }
}
