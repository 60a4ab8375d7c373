//! Producer and consumer operations on one named queue.

use std::sync::Arc;

use relq_core::{
    JobEvent, JobId, JobRecord, NewJob, QueueError, QueueStats, validate_ttl,
    validate_worker,
};
use relq_db::{AtomicStore, Commit, Write};

use crate::engine::Shared;
use crate::locks::select_claimable;
use crate::ConfigStore;

/// Most jobs one `clear` commit deletes.
pub const CLEAR_BATCH: usize = 64;

/// A handle on one queue. Queues have no state of their own beyond their jobs.
pub struct Queue<S: AtomicStore> {
    shared: Arc<Shared<S>>,
    name: String,
}

impl<S: AtomicStore> Clone for Queue<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            name: self.name.clone(),
        }
    }
}

impl<S: AtomicStore> Queue<S> {
    pub(crate) fn new(shared: Arc<Shared<S>>, name: String) -> Self {
        Self { shared, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Put a job on this queue with a lock window of `ttl` seconds.
    ///
    /// `None` uses the `heartbeat` option. Re-pushing an existing id updates
    /// it in place when it is already waiting here, and otherwise moves it
    /// onto this queue as a new episode.
    pub async fn push(&self, job: NewJob, ttl: Option<i64>) -> Result<JobId, QueueError> {
        job.validate()?;
        let ttl = match ttl {
            Some(ttl) => ttl,
            None => ConfigStore::new(Arc::clone(&self.shared)).heartbeat_secs().await?,
        };
        validate_ttl(ttl)?;

        let store = &self.shared.store;
        let mut contention = self.shared.contention("push");

        loop {
            let now = store.now();
            let write = match store.load_job(&job.id).await? {
                None => Write::Put {
                    expected: None,
                    job: JobRecord::enqueue(job.clone(), &self.name, ttl, now),
                    resequence: true,
                },
                Some(current) => {
                    let mut record = current.value;
                    let resequence = record.repush(job.clone(), &self.name, ttl, now)?;
                    Write::Put {
                        expected: Some(current.revision),
                        job: record,
                        resequence,
                    }
                }
            };

            match store.commit(vec![write]).await? {
                Commit::Applied => {
                    self.shared.emit(JobEvent::Pushed {
                        job_id: job.id,
                        queue: self.name.clone(),
                        priority: job.priority,
                        timestamp: now,
                    });
                    return Ok(job.id);
                }
                Commit::Conflict => contention.conflicted().await?,
            }
        }
    }

    /// Claim up to `count` jobs for `worker`.
    ///
    /// Expired locks are reclaimed on the way: the ones that make the cut are
    /// handed to `worker`, the rest go back to waiting.
    pub async fn pop(&self, worker: &str, count: usize) -> Result<Vec<JobRecord>, QueueError> {
        validate_worker(worker)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let store = &self.shared.store;
        let mut contention = self.shared.contention("pop");

        loop {
            let now = store.now();
            let plan = select_claimable(store.load_claimable(&self.name, now, count).await?, count);
            if plan.selected.is_empty() && plan.released.is_empty() {
                return Ok(Vec::new());
            }

            let mut writes = Vec::with_capacity(plan.selected.len() + plan.released.len());
            let mut events = Vec::new();
            let mut popped = Vec::with_capacity(plan.selected.len());

            for entry in plan.released {
                let mut job = entry.value;
                let lost = job.reclaim(now);
                events.push(JobEvent::LockLost {
                    job_id: job.id,
                    queue: self.name.clone(),
                    worker: lost,
                    timestamp: now,
                });
                writes.push(Write::Put {
                    expected: Some(entry.revision),
                    job,
                    resequence: false,
                });
            }

            for candidate in plan.selected {
                let mut job = candidate.job.value;
                if candidate.expired {
                    let lost = job.reclaim(now);
                    events.push(JobEvent::LockLost {
                        job_id: job.id,
                        queue: self.name.clone(),
                        worker: lost,
                        timestamp: now,
                    });
                }
                job.claim(worker, now);
                events.push(JobEvent::Popped {
                    job_id: job.id,
                    queue: self.name.clone(),
                    worker: worker.to_string(),
                    expires: job.expires.unwrap_or(now),
                    timestamp: now,
                });
                popped.push(job.clone());
                writes.push(Write::Put {
                    expected: Some(candidate.job.revision),
                    job,
                    resequence: false,
                });
            }

            match store.commit(writes).await? {
                Commit::Applied => {
                    tracing::debug!(queue = %self.name, worker, count = popped.len(), "popped jobs");
                    for event in events {
                        self.shared.emit(event);
                    }
                    return Ok(popped);
                }
                Commit::Conflict => contention.conflicted().await?,
            }
        }
    }

    /// The jobs the next `pop(count)` would take, as currently stored.
    pub async fn peek(&self, count: usize) -> Result<Vec<JobRecord>, QueueError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let store = &self.shared.store;
        let claimable = store.load_claimable(&self.name, store.now(), count).await?;
        Ok(select_claimable(claimable, count)
            .selected
            .into_iter()
            .map(|c| c.job.value)
            .collect())
    }

    /// Waiting plus locked jobs.
    pub async fn length(&self) -> Result<u64, QueueError> {
        Ok(self.stats().await?.active())
    }

    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        Ok(self.shared.store.count_by_state(&self.name).await?)
    }

    /// Delete every job that belongs to this queue, in any state.
    ///
    /// Deletes in batches of [`CLEAR_BATCH`], each its own commit with its own
    /// retry budget, so concurrent pops only ever collide with one batch.
    /// Jobs pushed while the clear runs are removed too.
    pub async fn clear(&self) -> Result<usize, QueueError> {
        let store = &self.shared.store;
        let mut removed = 0;
        let mut contention = self.shared.contention("clear");

        loop {
            let mut jobs = store.load_queue(&self.name).await?;
            if jobs.is_empty() {
                tracing::debug!(queue = %self.name, removed, "queue cleared");
                return Ok(removed);
            }
            jobs.truncate(CLEAR_BATCH);

            let writes = jobs
                .iter()
                .map(|entry| Write::Delete {
                    expected: entry.revision,
                    id: entry.value.id,
                })
                .collect();

            match store.commit(writes).await? {
                Commit::Applied => {
                    let now = store.now();
                    removed += jobs.len();
                    for entry in &jobs {
                        self.shared.emit(JobEvent::Deleted {
                            job_id: entry.value.id,
                            queue: self.name.clone(),
                            timestamp: now,
                        });
                    }
                    contention = self.shared.contention("clear");
                }
                Commit::Conflict => contention.conflicted().await?,
            }
        }
    }
}

impl<S: AtomicStore> std::fmt::Debug for Queue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue").field("name", &self.name).finish()
    }
}
