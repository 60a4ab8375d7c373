//! SurrealDB-backed store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relq_core::wire::to_epoch_seconds;
use relq_core::{JobId, JobRecord, QueueStats};
use tokio::sync::Mutex;

use crate::repositories::{ConfigRepository, JobRepository};
use crate::{
    AtomicStore, Claimable, Clock, Commit, Database, DbConfig, StoreError, SystemClock, Versioned,
    Write, connect, init_schema,
};

/// Store that keeps jobs and options in SurrealDB.
///
/// Timestamps come from the client-side [`Clock`], so processes sharing one
/// database must keep their clocks in step.
///
/// Commits issued through one store (and its clones) run one at a time.
/// Each write in a commit is also conditional on the revision it read, but
/// mutual exclusion is only guaranteed between engines sharing a store:
/// point several processes at one database only with a storage engine that
/// rejects overlapping write transactions.
#[derive(Clone)]
pub struct SurrealStore {
    db: Database,
    clock: Arc<dyn Clock>,
    commits: Arc<Mutex<()>>,
}

impl SurrealStore {
    /// Wrap a connection whose schema is already initialized.
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, SystemClock)
    }

    pub fn with_clock(db: Database, clock: impl Clock) -> Self {
        Self {
            db,
            clock: Arc::new(clock),
            commits: Arc::new(Mutex::new(())),
        }
    }

    /// Connect with `config` and initialize the schema.
    pub async fn connect(config: &DbConfig) -> Result<Self, StoreError> {
        let db = connect(config).await?;
        init_schema(&db).await?;
        Ok(Self::new(db))
    }

    /// Replace the clock, keeping the connection.
    pub fn using_clock(self, clock: impl Clock) -> Self {
        Self {
            clock: Arc::new(clock),
            ..self
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}

impl std::fmt::Debug for SurrealStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealStore").finish_non_exhaustive()
    }
}

impl AtomicStore for SurrealStore {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn load_job(&self, id: &JobId) -> Result<Option<Versioned<JobRecord>>, StoreError> {
        JobRepository::new(&self.db).get(*id).await
    }

    async fn load_claimable(
        &self,
        queue: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Claimable, StoreError> {
        JobRepository::new(&self.db)
            .claimable(queue, to_epoch_seconds(now), limit)
            .await
    }

    async fn load_queue(&self, queue: &str) -> Result<Vec<Versioned<JobRecord>>, StoreError> {
        JobRepository::new(&self.db).in_queue(queue).await
    }

    async fn count_by_state(&self, queue: &str) -> Result<QueueStats, StoreError> {
        JobRepository::new(&self.db).count_by_state(queue).await
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<Commit, StoreError> {
        let _turn = self.commits.lock().await;
        JobRepository::new(&self.db).commit(writes).await
    }

    async fn config_get(&self, name: &str) -> Result<Option<String>, StoreError> {
        ConfigRepository::new(&self.db).get(name).await
    }

    async fn config_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        ConfigRepository::new(&self.db).all().await
    }

    async fn config_set(&self, name: &str, value: Option<&str>) -> Result<(), StoreError> {
        let repo = ConfigRepository::new(&self.db);
        match value {
            Some(value) => repo.set(name, value).await,
            None => repo.delete(name).await,
        }
    }
}
