//! Job persistence over SurrealDB.

use std::collections::BTreeMap;

use relq_core::wire::{from_epoch_seconds, to_epoch_seconds};
use relq_core::{Failure, HistoryEntry, JobId, JobRecord, JobState, QueueStats};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

use crate::{Claimable, Commit, Database, StoreError, Versioned, Write};

/// Error text thrown by a failed revision guard.
const CONFLICT_MARKER: &str = "relq: job revision conflict";

/// SurrealDB's error for a transaction that overlapped another writer.
const TRANSACTION_CONFLICT: &str = "read or write conflict";

/// Repository for job persistence operations.
pub struct JobRepository<'a> {
    db: &'a Database,
}

/// Row stored in the `job` table.
///
/// The job id lives in `job_id`; `id` is the SurrealDB record id. `data` is
/// kept as JSON text so arbitrary nesting round-trips untouched.
#[derive(Debug, Serialize, Deserialize)]
struct JobRow {
    job_id: String,
    revision: String,
    data: String,
    priority: i32,
    #[serde(default)]
    tags: Vec<String>,
    queue: String,
    #[serde(default)]
    worker: String,
    state: JobState,
    #[serde(default)]
    expires: Option<f64>,
    ttl: i64,
    #[serde(default)]
    seq: i64,
    #[serde(default)]
    history: Vec<HistoryEntry>,
    #[serde(default)]
    failure: Option<Failure>,
}

impl JobRow {
    fn from_record(job: &JobRecord, revision: Ulid) -> Result<Self, StoreError> {
        Ok(Self {
            job_id: job.id.to_string(),
            revision: revision.to_string(),
            data: serde_json::to_string(&job.data)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            priority: job.priority,
            tags: job.tags.iter().cloned().collect(),
            queue: job.queue.clone(),
            worker: job.worker.clone(),
            state: job.state,
            expires: job.expires.map(to_epoch_seconds),
            ttl: job.ttl,
            seq: i64::try_from(job.sequence).unwrap_or(i64::MAX),
            history: job.history.clone(),
            failure: job.failure.clone(),
        })
    }

    fn into_versioned(self) -> Result<Versioned<JobRecord>, StoreError> {
        let corrupt = |what: &str| StoreError::Serialization(format!("job {}: bad {what}", self.job_id));
        let id = JobId::parse(&self.job_id).map_err(|_| corrupt("id"))?;
        let revision = Ulid::from_string(&self.revision).map_err(|_| corrupt("revision"))?;
        let data = serde_json::from_str(&self.data).map_err(|_| corrupt("data"))?;
        let expires = match self.expires {
            Some(seconds) => Some(from_epoch_seconds(seconds).ok_or_else(|| corrupt("expires"))?),
            None => None,
        };

        Ok(Versioned {
            revision,
            value: JobRecord {
                id,
                data,
                priority: self.priority,
                tags: self.tags.into_iter().collect(),
                queue: self.queue,
                worker: self.worker,
                state: self.state,
                expires,
                ttl: self.ttl,
                sequence: u64::try_from(self.seq).unwrap_or(0),
                history: self.history,
                failure: self.failure,
            },
        })
    }
}

fn rows_into_versioned(rows: Vec<JobRow>) -> Result<Vec<Versioned<JobRecord>>, StoreError> {
    rows.into_iter().map(JobRow::into_versioned).collect()
}

fn to_binding<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl<'a> JobRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Get a job by ID.
    pub async fn get(&self, id: JobId) -> Result<Option<Versioned<JobRecord>>, StoreError> {
        let row: Option<JobRow> = self.db.select(("job", id.to_string())).await?;
        row.map(JobRow::into_versioned).transpose()
    }

    /// Pop candidates of a queue, ordered by priority and arrival.
    pub async fn claimable(
        &self,
        queue: &str,
        now: f64,
        limit: usize,
    ) -> Result<Claimable, StoreError> {
        let mut result = self
            .db
            .query(
                r#"
                SELECT * FROM job
                WHERE queue = $queue AND state = "locked" AND expires < $now
                ORDER BY priority DESC, seq ASC
                LIMIT $limit;
                SELECT * FROM job
                WHERE queue = $queue AND state = "waiting"
                ORDER BY priority DESC, seq ASC
                LIMIT $limit;
                "#,
            )
            .bind(("queue", queue.to_string()))
            .bind(("now", now))
            .bind(("limit", i64::try_from(limit).unwrap_or(i64::MAX)))
            .await?;

        let expired: Vec<JobRow> = result.take(0)?;
        let waiting: Vec<JobRow> = result.take(1)?;

        Ok(Claimable {
            expired: rows_into_versioned(expired)?,
            waiting: rows_into_versioned(waiting)?,
        })
    }

    /// Every job that belongs to a queue.
    pub async fn in_queue(&self, queue: &str) -> Result<Vec<Versioned<JobRecord>>, StoreError> {
        let mut result = self
            .db
            .query("SELECT * FROM job WHERE queue = $queue")
            .bind(("queue", queue.to_string()))
            .await?;
        let rows: Vec<JobRow> = result.take(0)?;
        rows_into_versioned(rows)
    }

    /// Count jobs by state for a queue.
    pub async fn count_by_state(&self, queue: &str) -> Result<QueueStats, StoreError> {
        let mut result = self
            .db
            .query(
                r#"
                SELECT state, count() AS count
                FROM job
                WHERE queue = $queue
                GROUP BY state
                "#,
            )
            .bind(("queue", queue.to_string()))
            .await?;

        #[derive(Deserialize)]
        struct StateCount {
            state: JobState,
            count: i64,
        }

        let counts: Vec<StateCount> = result.take(0)?;

        let mut stats = QueueStats::default();
        for count in counts {
            stats.add(count.state, u64::try_from(count.count).unwrap_or(0));
        }
        Ok(stats)
    }

    /// Apply a batch of guarded writes in one transaction.
    ///
    /// Every write is conditional on the stored revision and reports the row
    /// it touched. A write that touched nothing throws, which cancels the
    /// whole transaction. Inserts rely on `CREATE` refusing an existing id.
    pub async fn commit(&self, writes: Vec<Write>) -> Result<Commit, StoreError> {
        if writes.is_empty() {
            return Ok(Commit::Applied);
        }

        let mut script = String::from("BEGIN TRANSACTION;\n");
        let mut bindings: BTreeMap<String, Value> = BTreeMap::new();

        for (i, write) in writes.iter().enumerate() {
            bindings.insert(format!("id{i}"), Value::String(write.job_id().to_string()));

            match write {
                Write::Put {
                    expected: None,
                    job,
                    resequence,
                } => {
                    bindings.insert(format!("row{i}"), to_binding(&JobRow::from_record(job, Ulid::new())?)?);
                    script.push_str(&format!("CREATE type::thing('job', $id{i}) CONTENT $row{i};\n"));
                    if *resequence {
                        script.push_str(&resequence_statements(i));
                    }
                }
                Write::Put {
                    expected: Some(expected),
                    job,
                    resequence,
                } => {
                    bindings.insert(format!("row{i}"), to_binding(&JobRow::from_record(job, Ulid::new())?)?);
                    bindings.insert(format!("expected{i}"), Value::String(expected.to_string()));
                    script.push_str(&format!(
                        "LET $hit{i} = (UPDATE type::thing('job', $id{i}) CONTENT $row{i} WHERE revision = $expected{i} RETURN BEFORE);\n\
                         IF array::len($hit{i}) == 0 {{ THROW \"{CONFLICT_MARKER}\"; }};\n"
                    ));
                    if *resequence {
                        script.push_str(&resequence_statements(i));
                    }
                }
                Write::Delete { expected, .. } => {
                    bindings.insert(format!("expected{i}"), Value::String(expected.to_string()));
                    script.push_str(&format!(
                        "LET $hit{i} = (DELETE type::thing('job', $id{i}) WHERE revision = $expected{i} RETURN BEFORE);\n\
                         IF array::len($hit{i}) == 0 {{ THROW \"{CONFLICT_MARKER}\"; }};\n"
                    ));
                }
            }
        }
        script.push_str("COMMIT TRANSACTION;");

        let mut response = self.db.query(script).bind(bindings).await?;
        let errors = response.take_errors();
        if errors.is_empty() {
            return Ok(Commit::Applied);
        }

        let messages: Vec<String> = errors.into_values().map(|e| e.to_string()).collect();
        if messages.iter().any(|m| is_conflict(m)) {
            tracing::debug!(writes = writes.len(), "job commit rejected by revision guard");
            return Ok(Commit::Conflict);
        }
        Err(StoreError::Query(messages.join("; ")))
    }
}

fn resequence_statements(i: usize) -> String {
    format!(
        "LET $seq{i} = (UPSERT job_sequence:jobs SET current += 1 RETURN VALUE current);\n\
         UPDATE type::thing('job', $id{i}) SET seq = $seq{i}[0];\n"
    )
}

/// Whether a failed commit lost a race rather than hit a real error.
///
/// Three cases, each tied to one statement the commit script runs: our own
/// revision guard, `CREATE` on an id that is already taken, and the storage
/// engine refusing to commit two overlapping transactions.
fn is_conflict(message: &str) -> bool {
    message.contains(CONFLICT_MARKER)
        || (message.contains("Database record `job:") && message.contains("already exists"))
        || message.contains(TRANSACTION_CONFLICT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_races_count_as_conflicts() {
        assert!(is_conflict("An error occurred: relq: job revision conflict"));
        assert!(is_conflict(
            "Database record `job:⟨01HZX⟩` already exists"
        ));
        assert!(is_conflict(
            "Failed to commit transaction due to a read or write conflict. This transaction can be retried"
        ));

        assert!(!is_conflict("Parse error: conflicting field definitions"));
        assert!(!is_conflict("Database record `queue_config:heartbeat` already exists"));
        assert!(!is_conflict("The query was not executed due to a failed transaction"));
    }
}
