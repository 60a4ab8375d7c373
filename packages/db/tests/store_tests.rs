//! The same contract checks run against both stores.

mod common;

use std::error::Error;

use chrono::TimeDelta;
use relq_core::JobState;
use relq_db::{AtomicStore, Commit, ManualClock, Write};
use serde_json::json;

async fn put_new<S: AtomicStore>(store: &S, job: relq_core::JobRecord) -> Result<(), Box<dyn Error>> {
    let outcome = store
        .commit(vec![Write::Put {
            expected: None,
            job,
            resequence: true,
        }])
        .await?;
    assert_eq!(outcome, Commit::Applied);
    Ok(())
}

async fn round_trip_and_guards<S: AtomicStore>(store: &S) -> Result<(), Box<dyn Error>> {
    let mut job = common::waiting_job("alpha", 0, 60);
    job.data = json!({ "nested": { "list": [1, 2.5, "x"], "flag": true } });
    job.tags = ["b", "a"].into_iter().map(String::from).collect();
    put_new(store, job.clone()).await?;

    let stored = store.load_job(&job.id).await?.expect("job stored");
    assert_eq!(stored.value.data, job.data);
    assert_eq!(stored.value.tags, job.tags);
    assert_eq!(stored.value.history, job.history);
    assert!(stored.value.sequence > 0);

    // inserting the same id again must not clobber it
    let duplicate = store
        .commit(vec![Write::Put {
            expected: None,
            job: job.clone(),
            resequence: true,
        }])
        .await?;
    assert_eq!(duplicate, Commit::Conflict);

    let mut locked = stored.value.clone();
    locked.claim("worker-a", common::start());
    let applied = store
        .commit(vec![Write::Put {
            expected: Some(stored.revision),
            job: locked,
            resequence: false,
        }])
        .await?;
    assert_eq!(applied, Commit::Applied);

    // the old revision is stale now
    let stale = store
        .commit(vec![Write::Delete {
            expected: stored.revision,
            id: job.id,
        }])
        .await?;
    assert_eq!(stale, Commit::Conflict);

    let current = store.load_job(&job.id).await?.expect("job still stored");
    assert_eq!(current.value.state, JobState::Locked);
    assert_eq!(current.value.sequence, stored.value.sequence);

    store
        .commit(vec![Write::Delete {
            expected: current.revision,
            id: job.id,
        }])
        .await?;
    assert!(store.load_job(&job.id).await?.is_none());
    Ok(())
}

async fn failed_batch_writes_nothing<S: AtomicStore>(store: &S) -> Result<(), Box<dyn Error>> {
    let existing = common::waiting_job("beta", 0, 60);
    put_new(store, existing.clone()).await?;
    let fresh = common::waiting_job("beta", 0, 60);

    // second write carries a bogus revision, so the first must not land either
    let outcome = store
        .commit(vec![
            Write::Put {
                expected: None,
                job: fresh.clone(),
                resequence: true,
            },
            Write::Put {
                expected: Some(ulid::Ulid::new()),
                job: existing,
                resequence: false,
            },
        ])
        .await?;
    assert_eq!(outcome, Commit::Conflict);
    assert!(store.load_job(&fresh.id).await?.is_none());
    Ok(())
}

async fn claimable_ordering<S: AtomicStore>(store: &S, clock: &ManualClock) -> Result<(), Box<dyn Error>> {
    let low = common::waiting_job("gamma", 0, 60);
    let high = common::waiting_job("gamma", 5, 60);
    let later_low = common::waiting_job("gamma", 0, 60);
    let other_queue = common::waiting_job("delta", 9, 60);
    for job in [&low, &high, &later_low, &other_queue] {
        put_new(store, job.clone()).await?;
    }

    let claimable = store.load_claimable("gamma", store.now(), 10).await?;
    let order: Vec<_> = claimable.waiting.iter().map(|j| j.value.id).collect();
    assert_eq!(order, vec![high.id, low.id, later_low.id]);
    assert!(claimable.expired.is_empty());

    let limited = store.load_claimable("gamma", store.now(), 2).await?;
    assert_eq!(limited.waiting.len(), 2);

    // lock `low` with a 10s window and let it run out
    let stored = store.load_job(&low.id).await?.expect("stored");
    let mut locked = stored.value.clone();
    locked.ttl = 10;
    locked.claim("worker-a", store.now());
    store
        .commit(vec![Write::Put {
            expected: Some(stored.revision),
            job: locked,
            resequence: false,
        }])
        .await?;

    let still_held = store.load_claimable("gamma", store.now(), 10).await?;
    assert!(still_held.expired.is_empty());
    assert_eq!(still_held.waiting.len(), 2);

    clock.advance(TimeDelta::seconds(11));
    let expired = store.load_claimable("gamma", store.now(), 10).await?;
    assert_eq!(expired.expired.len(), 1);
    assert_eq!(expired.expired[0].value.id, low.id);

    let stats = store.count_by_state("gamma").await?;
    assert_eq!((stats.waiting, stats.locked), (2, 1));
    assert_eq!(store.load_queue("gamma").await?.len(), 3);
    Ok(())
}

async fn config_round_trip<S: AtomicStore>(store: &S) -> Result<(), Box<dyn Error>> {
    assert_eq!(store.config_get("heartbeat").await?, None);
    store.config_set("heartbeat", Some("30")).await?;
    store.config_set("stall", Some("2")).await?;
    assert_eq!(store.config_get("heartbeat").await?.as_deref(), Some("30"));

    let all = store.config_all().await?;
    assert_eq!(all.get("stall").map(String::as_str), Some("2"));
    assert_eq!(all.len(), 2);

    store.config_set("heartbeat", None).await?;
    assert_eq!(store.config_get("heartbeat").await?, None);
    Ok(())
}

#[tokio::test]
async fn test_memory_store() -> Result<(), Box<dyn Error>> {
    let (store, clock) = common::memory_store();
    round_trip_and_guards(&store).await?;
    failed_batch_writes_nothing(&store).await?;
    claimable_ordering(&store, &clock).await?;
    config_round_trip(&store).await?;
    Ok(())
}

#[tokio::test]
async fn test_surreal_store() -> Result<(), Box<dyn Error>> {
    let (store, clock) = common::surreal_store().await?;
    round_trip_and_guards(&store).await?;
    failed_batch_writes_nothing(&store).await?;
    claimable_ordering(&store, &clock).await?;
    config_round_trip(&store).await?;
    Ok(())
}
