//! Lock renewal and release, plus the claim planner shared by pop and peek.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use relq_core::{JobEvent, JobId, JobRecord, QueueError, validate_worker};
use relq_db::{AtomicStore, Claimable, Commit, Versioned, Write};

use crate::engine::Shared;

/// A pop candidate and whether its previous lock ran out.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub job: Versioned<JobRecord>,
    pub expired: bool,
}

/// Which candidates a pop takes, and which expired locks it only releases.
#[derive(Debug, Clone, Default)]
pub struct ClaimPlan {
    pub selected: Vec<Candidate>,
    pub released: Vec<Versioned<JobRecord>>,
}

/// Merge expired and waiting candidates into claim order and take `count`.
///
/// Every expired lock ends up either selected or released, so a pop always
/// reclaims everything it loaded.
pub fn select_claimable(claimable: Claimable, count: usize) -> ClaimPlan {
    let mut candidates: Vec<Candidate> = claimable
        .expired
        .into_iter()
        .map(|job| Candidate { job, expired: true })
        .chain(
            claimable
                .waiting
                .into_iter()
                .map(|job| Candidate { job, expired: false }),
        )
        .collect();
    candidates.sort_by(|a, b| a.job.value.claim_order(&b.job.value));

    let rest = candidates.split_off(count.min(candidates.len()));
    ClaimPlan {
        selected: candidates,
        released: rest
            .into_iter()
            .filter(|c| c.expired)
            .map(|c| c.job)
            .collect(),
    }
}

/// Operations a worker performs on a job it holds.
pub struct LockManager<S: AtomicStore> {
    shared: Arc<Shared<S>>,
}

impl<S: AtomicStore> LockManager<S> {
    pub(crate) fn new(shared: Arc<Shared<S>>) -> Self {
        Self { shared }
    }

    /// Renew `worker`'s lock for another `ttl` seconds. Returns the new expiry.
    pub async fn heartbeat(&self, id: JobId, worker: &str) -> Result<DateTime<Utc>, QueueError> {
        validate_worker(worker)?;
        let (job, expires) = self
            .update_locked("heartbeat", id, |job, now| job.renew(worker, now))
            .await?;
        self.shared.emit(JobEvent::Renewed {
            job_id: id,
            queue: job.queue,
            worker: worker.to_string(),
            expires,
            timestamp: self.shared.store.now(),
        });
        Ok(expires)
    }

    /// Mark the job completed and release it.
    pub async fn complete(&self, id: JobId, worker: &str) -> Result<JobRecord, QueueError> {
        validate_worker(worker)?;
        let (job, ()) = self
            .update_locked("complete", id, |job, now| job.complete(worker, now))
            .await?;
        self.shared.emit(JobEvent::Completed {
            job_id: id,
            queue: job.queue.clone(),
            worker: worker.to_string(),
            timestamp: self.shared.store.now(),
        });
        Ok(job)
    }

    /// Mark the job failed with `reason` and release it.
    pub async fn fail(&self, id: JobId, worker: &str, reason: &str) -> Result<JobRecord, QueueError> {
        validate_worker(worker)?;
        let (job, ()) = self
            .update_locked("fail", id, |job, now| job.fail(worker, reason, now))
            .await?;
        self.shared.emit(JobEvent::Failed {
            job_id: id,
            queue: job.queue.clone(),
            worker: worker.to_string(),
            reason: reason.to_string(),
            timestamp: self.shared.store.now(),
        });
        Ok(job)
    }

    /// Load, transform and write back one job until the commit sticks.
    async fn update_locked<T: Send>(
        &self,
        op: &'static str,
        id: JobId,
        mut apply: impl FnMut(&mut JobRecord, DateTime<Utc>) -> Result<T, QueueError> + Send,
    ) -> Result<(JobRecord, T), QueueError> {
        let store = &self.shared.store;
        let mut contention = self.shared.contention(op);

        loop {
            let now = store.now();
            let current = store.load_job(&id).await?.ok_or(QueueError::NotFound(id))?;
            let mut job = current.value;
            let out = apply(&mut job, now)?;

            let write = Write::Put {
                expected: Some(current.revision),
                job: job.clone(),
                resequence: false,
            };
            match store.commit(vec![write]).await? {
                Commit::Applied => {
                    tracing::debug!(op, job_id = %id, state = %job.state, "lock updated");
                    return Ok((job, out));
                }
                Commit::Conflict => contention.conflicted().await?,
            }
        }
    }
}
