//! Replay of JSON-lines state histories through a worker-driven persistoid

use anyhow::{bail, Context};
use async_trait::async_trait;
use persistoid_core::{worker, PersistConfig, Persistoid, Snapshot, Storage, StorageError};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a replay
#[derive(Debug)]
pub struct ReplaySummary {
    pub storage_key: String,
    pub snapshots: usize,
    pub writes: u64,
}

/// Storage decorator counting successful writes
#[derive(Debug)]
struct CountingStorage {
    inner: Arc<dyn Storage>,
    writes: AtomicU64,
}

#[async_trait]
impl Storage for CountingStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set_item(key, value).await?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove_item(key).await
    }
}

/// Parse one line into the next snapshot
///
/// Values equal to the previous snapshot's keep its allocation, so only keys
/// that actually changed are re-encoded.
pub fn next_snapshot(previous: &Snapshot<Value>, line: &str) -> anyhow::Result<Snapshot<Value>> {
    let Value::Object(object) = serde_json::from_str::<Value>(line)? else {
        bail!("Each line must be a JSON object");
    };

    let mut snapshot = Snapshot::new();
    for (key, value) in object {
        snapshot = match previous.get(&key) {
            Some(old) if **old == value => snapshot.with_shared(key, Arc::clone(old)),
            _ => snapshot.with(key, value),
        };
    }
    Ok(snapshot)
}

pub async fn run(
    storage: Arc<dyn Storage>,
    config: PersistConfig,
    input: &Path,
    interval_ms: u64,
) -> anyhow::Result<ReplaySummary> {
    let content = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {:?}", input))?;

    let counting = Arc::new(CountingStorage {
        inner: storage,
        writes: AtomicU64::new(0),
    });
    let storage_key = config.storage_key();
    let persistoid = Persistoid::<Value>::new(config, counting.clone())?;
    let (handle, task) = worker::spawn(persistoid);

    let mut previous = Snapshot::new();
    let mut snapshots = 0;
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let snapshot = next_snapshot(&previous, line)
            .with_context(|| format!("Invalid snapshot on line {}", index + 1))?;
        handle.update(snapshot.clone());
        previous = snapshot;
        snapshots += 1;

        if interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    }

    handle.flush().await.context("Final flush failed")?;
    drop(handle);
    task.await.context("Persist worker panicked")?;

    let writes = counting.writes.load(Ordering::Relaxed);
    tracing::info!("Replay of {:?} finished after {} writes", input, writes);

    Ok(ReplaySummary {
        storage_key,
        snapshots,
        writes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistoid_core::MemoryStorage;
    use serde_json::json;

    #[test]
    fn test_next_snapshot_shares_unchanged_values() {
        let first = next_snapshot(&Snapshot::new(), r#"{"a":{"x":1},"b":2}"#).unwrap();
        let second = next_snapshot(&first, r#"{"a":{"x":1},"b":3}"#).unwrap();

        assert!(first.same_value(&second, "a"));
        assert!(!first.same_value(&second, "b"));
        assert_eq!(**second.get("b").unwrap(), json!(3));
    }

    #[test]
    fn test_next_snapshot_rejects_non_objects() {
        assert!(next_snapshot(&Snapshot::new(), "[1,2]").is_err());
        assert!(next_snapshot(&Snapshot::new(), "not json").is_err());
    }

    #[tokio::test]
    async fn test_replay_writes_final_state() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("history.jsonl");
        std::fs::write(
            &input,
            "{\"a\":1,\"b\":1}\n\n{\"a\":1,\"b\":2}\n{\"a\":5}\n",
        )
        .unwrap();

        let storage = Arc::new(MemoryStorage::new());
        let config = PersistConfig::new("replay");
        let summary = run(storage.clone(), config, &input, 0).await.unwrap();

        assert_eq!(summary.snapshots, 3);
        assert_eq!(summary.storage_key, "persist:replay");
        assert!(summary.writes >= 1);
        assert_eq!(
            storage.peek("persist:replay").as_deref(),
            Some(r#"{"a":"5"}"#)
        );
    }
}
