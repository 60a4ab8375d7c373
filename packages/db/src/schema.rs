//! Database schema definitions using SurrealQL.

use crate::{Database, StoreError};

/// Initialize the database schema.
///
/// Idempotent: every definition uses `IF NOT EXISTS` and the sequence counter
/// is only seeded when missing.
pub async fn init_schema(db: &Database) -> Result<(), StoreError> {
    tracing::info!("Initializing database schema...");

    for (name, statements) in [("job", JOB_SCHEMA), ("queue_config", CONFIG_SCHEMA)] {
        let mut response = db.query(statements).await?;
        let errors = response.take_errors();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.into_values().map(|e| e.to_string()).collect();
            return Err(StoreError::Query(format!(
                "schema for {name}: {}",
                messages.join("; ")
            )));
        }
    }

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Job table schema. Rows are written whole by the store, so the table is
/// schemaless and only the lookup paths are indexed.
const JOB_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job SCHEMALESS;

DEFINE INDEX IF NOT EXISTS job_id ON job FIELDS job_id UNIQUE;
DEFINE INDEX IF NOT EXISTS job_queue ON job FIELDS queue;
DEFINE INDEX IF NOT EXISTS job_queue_state ON job FIELDS queue, state;
DEFINE INDEX IF NOT EXISTS job_priority ON job FIELDS priority;

-- Arrival order counter shared by every queue
DEFINE TABLE IF NOT EXISTS job_sequence SCHEMALESS;
UPSERT job_sequence:jobs SET current = current ?? 0;
"#;

/// Named queue options.
const CONFIG_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS queue_config SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS name ON queue_config TYPE string;
DEFINE FIELD IF NOT EXISTS value ON queue_config TYPE string;
"#;
