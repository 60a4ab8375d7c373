//! relq: a priority work queue with expiring worker locks.
//!
//! Producers [`Queue::push`] jobs; workers [`Queue::pop`] them, keep their
//! lock alive with [`LockManager::heartbeat`] and finish with
//! [`LockManager::complete`] or [`LockManager::fail`]. A lock that is not
//! renewed in time is reclaimed by the next pop on that queue.
//!
//! Every operation is one read, compute, commit script against an
//! [`AtomicStore`]; a commit that loses a revision race re-runs the script.
//!
//! # Usage
//!
//! ```ignore
//! use relq::{Engine, MemoryStore, NewJob};
//!
//! let engine = Engine::new(MemoryStore::new());
//! let queue = engine.queue("emails")?;
//! let id = queue.push(NewJob::new(serde_json::json!({"to": "a@b.c"})), Some(30)).await?;
//!
//! for job in queue.pop("worker-1", 1).await? {
//!     engine.locks().complete(job.id, "worker-1").await?;
//! }
//! ```

mod config;
mod contention;
mod engine;
mod locks;
mod options;
mod queue;

pub use config::EngineConfig;
pub use engine::Engine;
pub use locks::{Candidate, ClaimPlan, LockManager, select_claimable};
pub use options::{ConfigStore, HEARTBEAT_OPTION};
pub use queue::{CLEAR_BATCH, Queue};

/// Re-export the domain and storage types callers need.
pub use relq_core::{
    Failure, HistoryEntry, JobEvent, JobId, JobRecord, JobState, NewJob, QueueError, QueueStats,
};
pub use relq_db::{
    AtomicStore, Clock, DbConfig, ManualClock, MemoryStore, SurrealStore, SystemClock,
};
