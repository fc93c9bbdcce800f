//! SqliteStorage: SQLite WAL backend for persisted records
//!
//! One row per storage key, with:
//! - WAL mode: non-blocking concurrent reads
//! - Integrity: Blake3 hash of the value verified on every read
//! - Timestamps: `saved_at_ms` of the last write, for inspection
//!
//! rusqlite is synchronous; every call runs on tokio's blocking pool.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use super::Storage;
use crate::error::StorageError;

/// Metadata of a stored row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    /// Storage key
    pub key: String,
    /// Blake3 hash of the value
    pub integrity_hash: String,
    /// Size of the value in bytes
    pub size: usize,
    /// Last write time, milliseconds since the Unix epoch
    pub saved_at_ms: i64,
}

/// SQLite-backed [`Storage`]
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the database in WAL mode
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL: concurrent readers, serialized writers
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Idempotent schema setup
    fn migrate(&self) -> Result<(), StorageError> {
        self.conn.lock().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS persist_items (
                key            TEXT PRIMARY KEY,
                value          TEXT NOT NULL,
                integrity_hash TEXT NOT NULL,
                saved_at_ms    INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn read(conn: &Connection, key: &str) -> Result<Option<String>, StorageError> {
        let row = conn
            .query_row(
                "SELECT value, integrity_hash FROM persist_items WHERE key = ?1",
                params![key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((value, expected)) = row else {
            return Ok(None);
        };

        let actual = blake3::hash(value.as_bytes()).to_hex().to_string();
        if actual != expected {
            return Err(StorageError::Integrity {
                key: key.to_string(),
                expected,
                actual,
            });
        }
        Ok(Some(value))
    }

    fn write(conn: &Connection, key: &str, value: &str) -> Result<(), StorageError> {
        let integrity_hash = blake3::hash(value.as_bytes()).to_hex().to_string();
        let saved_at_ms = chrono::Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO persist_items (key, value, integrity_hash, saved_at_ms)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                integrity_hash = excluded.integrity_hash,
                saved_at_ms = excluded.saved_at_ms",
            params![key, value, integrity_hash, saved_at_ms],
        )?;
        Ok(())
    }

    /// Metadata of every stored row, ordered by key
    pub fn list_items(&self) -> Result<Vec<StoredItem>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT key, integrity_hash, length(value), saved_at_ms
             FROM persist_items ORDER BY key",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(StoredItem {
                key: row.get(0)?,
                integrity_hash: row.get(1)?,
                size: row.get::<_, i64>(2)? as usize,
                saved_at_ms: row.get(3)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock())).await?
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let key = key.to_string();
        self.blocking(move |conn| Self::read(conn, &key)).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        let value = value.to_string();
        self.blocking(move |conn| Self::write(conn, &key, &value)).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        self.blocking(move |conn| {
            conn.execute("DELETE FROM persist_items WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
    }
}
