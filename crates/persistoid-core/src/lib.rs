//! Persistoid Core - Incremental, throttled persistence of in-memory state
//!
//! A persistoid watches successive immutable snapshots of a key-value state and
//! mirrors them into an async key-value storage as one serialized record,
//! re-encoding only the keys whose value allocation changed.
//!
//! # Architecture
//!
//! Persistoid is built on five layers:
//!
//! 1. **Diff tracking** (`tracker`): reference-equality change detection into a dirty queue
//! 2. **Transforms** (`transform`): ordered outbound pipeline, a stage may drop a key
//! 3. **Staging** (`codec`): per-key encoded values, always in sync with the latest state
//! 4. **Scheduling** (`scheduler`): leading + trailing edge throttle of processing cycles
//! 5. **Writes** (`persistoid`, `handle`, `storage`): one serialized write in flight at a time
//!
//! ```text
//!   host ──update(snapshot)──► Persistoid ──set_item(key, record)──► Storage
//!     │                            │
//!     └──────flush()──────────► WriteHandle (shared, awaitable)
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use persistoid_core::{MemoryStorage, PersistConfig, Persistoid, Snapshot};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(MemoryStorage::new());
//! let config = PersistConfig::new("root").with_whitelist(["a", "b"]);
//! let mut persistoid = Persistoid::new(config, storage.clone())?;
//!
//! let state = Snapshot::new().with("a", 1).with("b", 2).with("c", 3);
//! persistoid.update(state);
//! persistoid.flush().await?;
//!
//! assert_eq!(storage.peek("persist:root").as_deref(), Some(r#"{"a":"1","b":"2"}"#));
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Incremental encoding**: unchanged values are never re-serialized
//! - **Throttled writes**: bursts of updates coalesce into at most two cycles
//! - **Key filtering**: whitelist and blacklist, with an always-allowed control key
//! - **Pluggable storage**: in-memory, one-file-per-key and SQLite (Blake3-verified) backends
//! - **Background worker**: drive an instance from any task through a clonable handle

#![deny(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod handle;
pub mod persistoid;
pub mod report;
pub mod scheduler;
pub mod snapshot;
pub mod storage;
pub mod stored;
pub mod tracker;
pub mod transform;
pub mod worker;

// Re-export commonly used types for convenience
pub use codec::{Codec, StagedMap};
pub use config::PersistConfig;
pub use error::{CodecError, ConfigError, PersistError, Result, StorageError};
pub use filter::KeyFilter;
pub use handle::WriteHandle;
pub use persistoid::{Persistoid, PersistoidBuilder, Phase};
pub use report::{FailureReporter, TracingReporter};
pub use scheduler::{Throttle, ThrottleState};
pub use snapshot::Snapshot;
pub use storage::{FileStorage, MemoryStorage, SqliteStorage, Storage};
pub use stored::{load_stored_state, purge_stored_state, read_record};
pub use transform::{from_fn, Pipeline, Scoped, Transform};
pub use worker::PersistHandle;

/// Key exempt from the whitelist, reserved for persistence metadata
pub const CONTROL_KEY: &str = "_persist";

/// Prefix of every storage key unless configured otherwise
pub const DEFAULT_KEY_PREFIX: &str = "persist:";

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
