#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use relq_core::{JobRecord, NewJob};
use relq_db::{DbConfig, ManualClock, MemoryStore, StoreError, SurrealStore};
use serde_json::json;
use ulid::Ulid;

pub fn start() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub fn memory_store() -> (MemoryStore, ManualClock) {
    let clock = ManualClock::new(start());
    (MemoryStore::with_clock(clock.clone()), clock)
}

/// A fresh in-memory SurrealDB database per test.
pub async fn surreal_store() -> Result<(SurrealStore, ManualClock), StoreError> {
    let clock = ManualClock::new(start());
    let config = DbConfig::memory().with_database(Ulid::new().to_string());
    let store = SurrealStore::connect(&config).await?.using_clock(clock.clone());
    Ok((store, clock))
}

pub fn waiting_job(queue: &str, priority: i32, ttl: i64) -> JobRecord {
    let new = NewJob::new(json!({ "queue": queue })).with_priority(priority);
    JobRecord::enqueue(new, queue, ttl, start())
}
