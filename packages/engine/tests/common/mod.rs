#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use relq::{
    DbConfig, Engine, EngineConfig, ManualClock, MemoryStore, NewJob, QueueError, SurrealStore,
};
use serde_json::json;
use ulid::Ulid;

/// Route engine logs to the test harness. Set `RUST_LOG=relq=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn start() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub fn memory_engine() -> (Engine<MemoryStore>, ManualClock) {
    init_tracing();
    let clock = ManualClock::new(start());
    (Engine::new(MemoryStore::with_clock(clock.clone())), clock)
}

/// A fresh in-memory SurrealDB database per test.
pub async fn surreal_engine() -> Result<(Engine<SurrealStore>, ManualClock), QueueError> {
    surreal_engine_with(EngineConfig::default()).await
}

pub async fn surreal_engine_with(
    engine_config: EngineConfig,
) -> Result<(Engine<SurrealStore>, ManualClock), QueueError> {
    init_tracing();
    let clock = ManualClock::new(start());
    let config = DbConfig::memory().with_database(Ulid::new().to_string());
    let store = SurrealStore::connect(&config).await?.using_clock(clock.clone());
    Ok((Engine::with_config(store, engine_config), clock))
}

pub fn job(name: &str) -> NewJob {
    NewJob::new(json!({ "name": name }))
}
