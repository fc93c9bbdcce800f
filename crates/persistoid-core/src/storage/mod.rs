//! Storage backends
//!
//! The engine only needs an async key-value `set`; reading and removing are
//! used by [`stored`](crate::stored) for read-back and purge.
//!
//! # Backends
//!
//! ```text
//! ┌──────────────────┬──────────────────────┬──────────────────────────┐
//! │  MemoryStorage   │     FileStorage      │      SqliteStorage       │
//! │  (tests, caches) │  (one file per key)  │  (WAL + Blake3 checksum) │
//! └──────────────────┴──────────────────────┴──────────────────────────┘
//! ```

pub mod file_store;
pub mod sqlite_store;

pub use file_store::FileStorage;
pub use sqlite_store::{SqliteStorage, StoredItem};

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::StorageError;

/// Async key-value storage consumed by the engine
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    /// Read the value stored under `key`
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`; removing a missing key is not an error
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

#[async_trait]
impl<S> Storage for Arc<S>
where
    S: Storage + ?Sized,
{
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key).await
    }
}

/// In-process storage backed by a hash map
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    writes: AtomicU64,
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value without going through the async interface
    pub fn peek(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    /// Number of successful `set_item` calls so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Check whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.peek(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.write().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.write().remove(key);
        Ok(())
    }
}
