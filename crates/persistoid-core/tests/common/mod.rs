//! Test doubles shared by the integration suites

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use persistoid_core::{
    Codec, CodecError, FailureReporter, MemoryStorage, Storage, StorageError,
};
use serde_json::Value;

/// Reporter remembering every failure it was told about
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub encode_failures: Mutex<Vec<String>>,
    pub write_failures: Mutex<Vec<String>>,
}

impl FailureReporter for RecordingReporter {
    fn encode_failed(&self, key: &str, _error: &CodecError) {
        self.encode_failures.lock().push(key.to_string());
    }

    fn write_failed(&self, storage_key: &str, _error: &StorageError) {
        self.write_failures.lock().push(storage_key.to_string());
    }
}

/// Storage rejecting every write
#[derive(Debug, Default)]
pub struct FailingStorage {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl Storage for FailingStorage {
    async fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    async fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Backend("disk full".to_string()))
    }

    async fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Memory storage whose writes take `delay` and which tracks concurrency
#[derive(Debug)]
pub struct SlowStorage {
    pub inner: MemoryStorage,
    pub delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub payloads: Mutex<Vec<String>>,
}

impl SlowStorage {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStorage::new(),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Storage for SlowStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.payloads.lock().push(value.to_string());
        let result = self.inner.set_item(key, value).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove_item(key).await
    }
}

/// Decode a stored record into a JSON object of decoded values
pub fn decode_record(payload: &str) -> Value {
    let codec = Codec::Json;
    let staged = codec.decode_record(payload).unwrap();
    Value::Object(
        staged
            .iter()
            .map(|(k, v)| (k.clone(), codec.decode_value::<Value>(v).unwrap()))
            .collect(),
    )
}

/// Decoded record currently held by `storage` under `key`
pub fn stored(storage: &MemoryStorage, key: &str) -> Value {
    decode_record(&storage.peek(key).unwrap())
}
