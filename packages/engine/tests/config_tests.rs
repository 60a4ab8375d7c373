mod common;

use std::error::Error;

use relq::{AtomicStore, Engine, EngineConfig, HEARTBEAT_OPTION, MemoryStore, QueueError};

async fn options_round_trip<S: AtomicStore>(engine: &Engine<S>) -> Result<(), Box<dyn Error>> {
    let config = engine.config();
    assert_eq!(config.get("foo").await?, None);

    config.set("foo", Some("bar")).await?;
    config.set("baz", Some("1")).await?;
    assert_eq!(config.get("foo").await?.as_deref(), Some("bar"));

    let all = config.all().await?;
    assert_eq!(all.get("foo").map(String::as_str), Some("bar"));
    assert_eq!(all.get("baz").map(String::as_str), Some("1"));

    config.set("foo", None).await?;
    assert_eq!(config.get("foo").await?, None);
    config.unset("baz").await?;
    assert!(config.all().await?.is_empty());

    assert!(matches!(config.get("").await, Err(QueueError::InvalidArgument(_))));
    assert!(matches!(
        config.set("", Some("x")).await,
        Err(QueueError::InvalidArgument(_))
    ));
    Ok(())
}

async fn heartbeat_option_sets_default_ttl<S: AtomicStore>(
    engine: &Engine<S>,
) -> Result<(), Box<dyn Error>> {
    let config = engine.config();
    let queue = engine.queue("configured")?;

    assert_eq!(config.heartbeat_secs().await?, 60);

    config.set(HEARTBEAT_OPTION, Some("15")).await?;
    let id = queue.push(common::job("short"), None).await?;
    assert_eq!(engine.job(id).await?.ttl, 15);

    // an explicit ttl wins over the option
    let id = queue.push(common::job("explicit"), Some(120)).await?;
    assert_eq!(engine.job(id).await?.ttl, 120);

    config.set(HEARTBEAT_OPTION, Some("soon")).await?;
    assert_eq!(config.heartbeat_secs().await?, 60);
    config.unset(HEARTBEAT_OPTION).await?;
    Ok(())
}

#[tokio::test]
async fn test_config_memory() -> Result<(), Box<dyn Error>> {
    let (engine, _clock) = common::memory_engine();
    options_round_trip(&engine).await?;
    heartbeat_option_sets_default_ttl(&engine).await?;
    Ok(())
}

#[tokio::test]
async fn test_config_surreal() -> Result<(), Box<dyn Error>> {
    let (engine, _clock) = common::surreal_engine().await?;
    options_round_trip(&engine).await?;
    heartbeat_option_sets_default_ttl(&engine).await?;
    Ok(())
}

#[tokio::test]
async fn test_engine_config_defaults() -> Result<(), Box<dyn Error>> {
    let parsed: EngineConfig = serde_json::from_str(r#"{ "default_heartbeat_secs": 5 }"#)?;
    assert_eq!(parsed.default_heartbeat_secs, 5);
    assert_eq!(parsed.max_conflict_retries, 32);

    let engine = Engine::with_config(MemoryStore::new(), parsed);
    assert_eq!(engine.config().heartbeat_secs().await?, 5);
    Ok(())
}
