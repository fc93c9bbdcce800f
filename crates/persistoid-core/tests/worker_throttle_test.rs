//! Throttle timing through the background worker
//!
//! All tests run on a paused clock: sleeping advances virtual time only once
//! every task is idle, so write counts are observed deterministically.

mod common;

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use common::stored;
use persistoid_core::worker;
use persistoid_core::{MemoryStorage, PersistConfig, Persistoid, Snapshot};

fn spawn_worker(
    throttle_ms: u64,
) -> (
    worker::PersistHandle<Value>,
    tokio::task::JoinHandle<()>,
    Arc<MemoryStorage>,
) {
    let storage = Arc::new(MemoryStorage::new());
    let config = PersistConfig::new("root").with_throttle(Duration::from_millis(throttle_ms));
    let persistoid = Persistoid::new(config, storage.clone()).unwrap();
    let (handle, task) = worker::spawn(persistoid);
    (handle, task, storage)
}

fn counter(n: i64) -> Snapshot<Value> {
    Snapshot::new().with("count", json!(n))
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_leading_edge_runs_immediately() {
    let (handle, _task, storage) = spawn_worker(100);

    handle.update(counter(1));
    advance(1).await;

    assert_eq!(storage.write_count(), 1);
    assert_eq!(stored(&storage, "persist:root"), json!({"count": 1}));
}

#[tokio::test(start_paused = true)]
async fn test_burst_coalesces_into_trailing_run() {
    let (handle, _task, storage) = spawn_worker(100);

    handle.update(counter(0));
    advance(1).await;
    assert_eq!(storage.write_count(), 1);

    for n in 1..=5 {
        handle.update(counter(n));
        advance(10).await;
    }
    // t = 51ms: still inside the suppression window
    assert_eq!(storage.write_count(), 1);

    advance(60).await;
    assert_eq!(storage.write_count(), 2);
    assert_eq!(stored(&storage, "persist:root"), json!({"count": 5}));

    // No further triggers, no further writes
    advance(1_000).await;
    assert_eq!(storage.write_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_runs_every_update() {
    let (handle, _task, storage) = spawn_worker(0);

    for n in 1..=3 {
        handle.update(counter(n));
        advance(1).await;
        assert_eq!(storage.write_count(), n as u64);
    }
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_batches_same_tick_updates() {
    let (handle, _task, storage) = spawn_worker(0);

    for n in 1..=4 {
        handle.update(counter(n));
    }
    advance(1).await;

    assert_eq!(storage.write_count(), 1);
    assert_eq!(stored(&storage, "persist:root"), json!({"count": 4}));
}

#[tokio::test(start_paused = true)]
async fn test_trigger_after_window_is_new_leading_edge() {
    let (handle, _task, storage) = spawn_worker(100);

    handle.update(counter(1));
    advance(200).await;
    assert_eq!(storage.write_count(), 1);

    handle.update(counter(2));
    advance(1).await;
    assert_eq!(storage.write_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_flush_bypasses_throttle() {
    let (handle, _task, storage) = spawn_worker(1_000);

    handle.update(counter(1));
    advance(1).await;
    handle.update(counter(2));
    handle.flush().await.unwrap();
    assert_eq!(storage.write_count(), 2);

    // The pending trailing run was satisfied by the flush
    advance(5_000).await;
    assert_eq!(storage.write_count(), 2);
    assert_eq!(stored(&storage, "persist:root"), json!({"count": 2}));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handles_drains_pending_work() {
    let (handle, task, storage) = spawn_worker(1_000);

    handle.update(counter(1));
    advance(1).await;
    handle.update(counter(2));
    drop(handle);

    task.await.unwrap();
    assert_eq!(storage.write_count(), 2);
    assert_eq!(stored(&storage, "persist:root"), json!({"count": 2}));
}
