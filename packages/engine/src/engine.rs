//! The engine handle shared by every queue, lock and option accessor.

use std::sync::Arc;

use relq_core::{JobEvent, JobId, JobRecord, QueueError, validate_queue_name};
use relq_db::{AtomicStore, Commit, Write};
use tokio::sync::broadcast;

use crate::contention::Contention;
use crate::{ConfigStore, EngineConfig, LockManager, Queue};

pub(crate) struct Shared<S> {
    pub(crate) store: S,
    pub(crate) config: EngineConfig,
    events: broadcast::Sender<JobEvent>,
}

impl<S> Shared<S> {
    pub(crate) fn contention(&self, op: &'static str) -> Contention {
        Contention::new(op, self.config.max_conflict_retries)
    }

    /// Broadcast an event. Having no subscribers is fine.
    pub(crate) fn emit(&self, event: JobEvent) {
        tracing::debug!(job_id = %event.job_id(), queue = event.queue(), "{}", event.description());
        let _ = self.events.send(event);
    }
}

/// Entry point: owns the store and hands out queues, locks and options.
///
/// Cloning is cheap and clones share the same store and event channel.
pub struct Engine<S: AtomicStore> {
    shared: Arc<Shared<S>>,
}

impl<S: AtomicStore> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: AtomicStore> Engine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                store,
                config,
                events,
            }),
        }
    }

    /// A handle on the named queue. Queues exist implicitly.
    pub fn queue(&self, name: &str) -> Result<Queue<S>, QueueError> {
        validate_queue_name(name)?;
        Ok(Queue::new(Arc::clone(&self.shared), name.to_string()))
    }

    pub fn locks(&self) -> LockManager<S> {
        LockManager::new(Arc::clone(&self.shared))
    }

    /// Runtime options stored alongside the jobs.
    pub fn config(&self) -> ConfigStore<S> {
        ConfigStore::new(Arc::clone(&self.shared))
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn store(&self) -> &S {
        &self.shared.store
    }

    /// Receive every event committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.events.subscribe()
    }

    /// Look up a job in any queue and state.
    pub async fn job(&self, id: JobId) -> Result<JobRecord, QueueError> {
        self.shared
            .store
            .load_job(&id)
            .await?
            .map(|entry| entry.value)
            .ok_or(QueueError::NotFound(id))
    }

    /// Remove a job entirely, whatever its state. Returns the removed record.
    pub async fn delete_job(&self, id: JobId) -> Result<JobRecord, QueueError> {
        let store = &self.shared.store;
        let mut contention = self.shared.contention("delete_job");

        loop {
            let current = store.load_job(&id).await?.ok_or(QueueError::NotFound(id))?;
            let write = Write::Delete {
                expected: current.revision,
                id,
            };

            match store.commit(vec![write]).await? {
                Commit::Applied => {
                    self.shared.emit(JobEvent::Deleted {
                        job_id: id,
                        queue: current.value.queue.clone(),
                        timestamp: store.now(),
                    });
                    return Ok(current.value);
                }
                Commit::Conflict => contention.conflicted().await?,
            }
        }
    }
}

impl<S: AtomicStore> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
