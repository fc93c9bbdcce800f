//! Error types for Persistoid Core
//!
//! This module defines the error types used throughout the persistence engine.
//! We use `thiserror` for ergonomic error definitions with automatic Display/Error implementations.
//!
//! [`PersistError`] is `Clone`: one write outcome is shared by every awaiter of a
//! [`WriteHandle`](crate::handle::WriteHandle), so backend errors travel behind an `Arc`.

use std::sync::Arc;

use thiserror::Error;

/// Result type alias for persistence operations
pub type Result<T> = std::result::Result<T, PersistError>;

/// Main error type for persistence operations
#[derive(Error, Debug, Clone)]
pub enum PersistError {
    /// A value (or the whole staged record) could not be encoded
    #[error("Encoding error for key '{key}': {source}")]
    Encode {
        /// State key, or the storage key when the record itself failed
        key: String,
        /// Underlying codec failure
        #[source]
        source: CodecError,
    },

    /// A stored value could not be decoded
    #[error("Decoding error for key '{key}': {source}")]
    Decode {
        /// State key, or the storage key when the record itself failed
        key: String,
        /// Underlying codec failure
        #[source]
        source: CodecError,
    },

    /// The storage backend rejected a write
    #[error("Write to '{storage_key}' failed: {source}")]
    Write {
        /// Storage key of the persisted record
        storage_key: String,
        /// Backend failure
        #[source]
        source: Arc<StorageError>,
    },

    /// The storage backend failed a read
    #[error("Read of '{storage_key}' failed: {source}")]
    Read {
        /// Storage key of the persisted record
        storage_key: String,
        /// Backend failure
        #[source]
        source: Arc<StorageError>,
    },

    /// The storage backend failed to remove a record
    #[error("Removal of '{storage_key}' failed: {source}")]
    Remove {
        /// Storage key of the persisted record
        storage_key: String,
        /// Backend failure
        #[source]
        source: Arc<StorageError>,
    },

    /// The task driving a write was cancelled or panicked
    #[error("Write task aborted: {0}")]
    WriteTask(String),

    /// The persist worker is no longer running
    #[error("Persist worker stopped")]
    WorkerClosed,
}

/// Errors raised while encoding or decoding values
#[derive(Error, Debug, Clone)]
pub enum CodecError {
    /// JSON (de)serialization failed
    #[error("JSON codec error: {0}")]
    Json(Arc<serde_json::Error>),

    /// Pass-through mode received a value that is not already a string
    #[error("Expected a pre-encoded string value, got {found}")]
    NotPreEncoded {
        /// JSON kind of the offending value
        found: &'static str,
    },
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Json(Arc::new(e))
    }
}

/// Errors reported by storage backends
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite errors
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Stored bytes do not match their recorded hash
    #[error("Integrity violation for '{key}': expected hash {expected}, found {actual}")]
    Integrity {
        /// Storage key
        key: String,
        /// Hash recorded at write time
        expected: String,
        /// Hash of the bytes read back
        actual: String,
    },

    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A blocking storage task could not complete
    #[error("Storage task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(e: tokio::task::JoinError) -> Self {
        StorageError::Task(e.to_string())
    }
}

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parse errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Semantically invalid configuration
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl PersistError {
    /// Storage error behind a `Write`, `Read` or `Remove` failure, if any
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            Self::Write { source, .. } | Self::Read { source, .. } | Self::Remove { source, .. } => {
                Some(source.as_ref())
            }
            _ => None,
        }
    }
}
