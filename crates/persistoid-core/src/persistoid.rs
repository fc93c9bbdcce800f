//! The persistence engine
//!
//! A [`Persistoid`] owns the last snapshot, the dirty queue, the staged record
//! and the write handle of one storage key. All mutation happens through
//! `&mut self`; only the storage write itself runs concurrently, as a task on
//! the tokio runtime, so every method must be called from within a runtime.
//!
//! Cycle outline:
//!
//! ```text
//! update ──► DiffTracker ──► Throttle ──(due)──► process ──► Storage::set_item
//!                                                  ▲
//! flush ───────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

use crate::codec::{Codec, StagedMap};
use crate::config::PersistConfig;
use crate::error::{ConfigError, PersistError};
use crate::filter::KeyFilter;
use crate::handle::WriteHandle;
use crate::report::{FailureReporter, TracingReporter};
use crate::scheduler::Throttle;
use crate::snapshot::Snapshot;
use crate::storage::Storage;
use crate::tracker::DiffTracker;
use crate::transform::{Pipeline, Transform};

/// Observable lifecycle phase of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing pending and no write in flight
    Idle,
    /// Changes are waiting for a cycle
    Dirty,
    /// The last write has not completed yet
    Flushing,
}

/// Builder attaching transforms and a reporter to a [`PersistConfig`]
pub struct PersistoidBuilder<V> {
    config: PersistConfig,
    pipeline: Pipeline<V>,
    reporter: Option<Arc<dyn FailureReporter>>,
}

impl<V> PersistoidBuilder<V>
where
    V: Serialize + Send + Sync + 'static,
{
    /// Append a transform stage
    pub fn transform<T>(mut self, stage: T) -> Self
    where
        T: Transform<V> + 'static,
    {
        self.pipeline.push(Box::new(stage));
        self
    }

    /// Replace the default [`TracingReporter`]
    pub fn reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Validate the configuration and create the instance
    pub fn build(self, storage: Arc<dyn Storage>) -> Result<Persistoid<V>, ConfigError> {
        self.config.validate()?;

        let storage_key = self.config.storage_key();
        tracing::debug!(
            "Persistoid created for '{}' ({} transform stages, throttle {}ms)",
            storage_key,
            self.pipeline.len(),
            self.config.throttle_ms
        );

        Ok(Persistoid {
            storage_key,
            filter: self.config.key_filter(),
            codec: self.config.codec(),
            scheduler: Throttle::new(self.config.throttle_interval()),
            pipeline: self.pipeline,
            tracker: DiffTracker::new(),
            staged: StagedMap::new(),
            storage,
            reporter: self.reporter.unwrap_or_else(|| Arc::new(TracingReporter)),
            write: WriteHandle::settled(),
            writes_issued: 0,
        })
    }
}

impl<V> fmt::Debug for PersistoidBuilder<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistoidBuilder")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// Incremental, throttled persister for one storage key
pub struct Persistoid<V> {
    storage_key: String,
    filter: KeyFilter,
    codec: Codec,
    pipeline: Pipeline<V>,
    tracker: DiffTracker<V>,
    staged: StagedMap,
    scheduler: Throttle,
    storage: Arc<dyn Storage>,
    reporter: Arc<dyn FailureReporter>,
    write: WriteHandle,
    writes_issued: u64,
}

impl<V> Persistoid<V>
where
    V: Serialize + Send + Sync + 'static,
{
    /// Start building an instance from `config`
    pub fn builder(config: PersistConfig) -> PersistoidBuilder<V> {
        PersistoidBuilder {
            config,
            pipeline: Pipeline::new(),
            reporter: None,
        }
    }

    /// Create an instance without transforms, logging failures via `tracing`
    pub fn new(config: PersistConfig, storage: Arc<dyn Storage>) -> Result<Self, ConfigError> {
        Self::builder(config).build(storage)
    }

    /// Notify the instance of a new state snapshot
    ///
    /// Changed keys are queued immediately; the cycle itself runs when the
    /// scheduler says so (see [`Persistoid::run_due`]) or on [`Persistoid::flush`].
    pub fn update(&mut self, snapshot: Snapshot<V>) {
        let queued = self.tracker.observe(snapshot, &self.filter);
        if queued > 0 {
            tracing::trace!("{} keys queued for '{}'", queued, self.storage_key);
        }
        self.scheduler.trigger(Instant::now());
    }

    /// When the scheduler wants the next cycle, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// Run the cycle if the scheduler says it is due at `now`
    ///
    /// Returns the new write handle when a write was issued.
    pub fn run_due(&mut self, now: Instant) -> Option<WriteHandle> {
        if !self.scheduler.poll(now) {
            return None;
        }
        if !self.has_pending_work() {
            tracing::trace!("Scheduled cycle for '{}' had nothing to do", self.storage_key);
            return None;
        }
        Some(self.process())
    }

    /// Drain pending work now, bypassing the throttle
    ///
    /// Returns the handle of the write issued for the pending work. With nothing
    /// pending the handle is already settled with success; the outcome of an
    /// earlier write stays on [`Persistoid::write_handle`].
    pub fn flush(&mut self) -> WriteHandle {
        if !self.has_pending_work() {
            return WriteHandle::resolved(self.writes_issued, Ok(()));
        }
        let handle = self.process();
        self.scheduler.on_flush(Instant::now());
        handle
    }

    /// True when dirty keys are queued or staged keys left the snapshot
    pub fn has_pending_work(&self) -> bool {
        if !self.tracker.queue().is_empty() {
            return true;
        }
        let latest = self.tracker.last();
        self.staged.keys().any(|key| !latest.contains_key(key))
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        if self.has_pending_work() {
            Phase::Dirty
        } else if !self.write.is_settled() {
            Phase::Flushing
        } else {
            Phase::Idle
        }
    }

    /// Handle of the newest write
    pub fn write_handle(&self) -> WriteHandle {
        self.write.clone()
    }

    /// Staged record (best-known durable image)
    pub fn staged(&self) -> &StagedMap {
        &self.staged
    }

    /// Number of keys waiting for a cycle
    pub fn pending_keys(&self) -> usize {
        self.tracker.queue().len()
    }

    /// Full storage key of the record
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Number of writes issued so far
    pub fn writes_issued(&self) -> u64 {
        self.writes_issued
    }

    /// One processing cycle: drain the queue, reconcile, write
    fn process(&mut self) -> WriteHandle {
        while let Some(key) = self.tracker.next_dirty() {
            let state = self.tracker.last().clone();
            let output = state
                .get(&key)
                .cloned()
                .and_then(|initial| self.pipeline.run(&key, initial, &state));

            match output {
                None => {
                    self.staged.remove(&key);
                }
                Some(value) => match self.codec.encode_value(&*value) {
                    Ok(encoded) => {
                        self.staged.insert(key, encoded);
                    }
                    Err(err) => self.reporter.encode_failed(&key, &err),
                },
            }
        }

        // Keys removed from state never pass through the queue
        let latest = self.tracker.last();
        self.staged.retain(|key, _| latest.contains_key(key));

        self.writes_issued += 1;
        let sequence = self.writes_issued;

        self.write = match self.codec.encode_record(&self.staged) {
            Ok(payload) => self.issue_write(sequence, payload),
            Err(err) => {
                self.reporter.encode_failed(&self.storage_key, &err);
                WriteHandle::resolved(
                    sequence,
                    Err(PersistError::Encode {
                        key: self.storage_key.clone(),
                        source: err,
                    }),
                )
            }
        };
        self.write.clone()
    }

    /// Spawn the write, ordered after the previous one
    fn issue_write(&self, sequence: u64, payload: String) -> WriteHandle {
        let previous = self.write.clone();
        let storage = Arc::clone(&self.storage);
        let reporter = Arc::clone(&self.reporter);
        let storage_key = self.storage_key.clone();

        tracing::debug!(
            "Write #{} issued for '{}' ({} keys, {} bytes)",
            sequence,
            storage_key,
            self.staged.len(),
            payload.len()
        );

        WriteHandle::spawn(sequence, async move {
            // One write in flight per instance; the outcome of the previous
            // write was already reported by its own task.
            let _ = previous.await;

            match storage.set_item(&storage_key, &payload).await {
                Ok(()) => {
                    tracing::debug!("Write #{} to '{}' completed", sequence, storage_key);
                    Ok(())
                }
                Err(err) => {
                    reporter.write_failed(&storage_key, &err);
                    Err(PersistError::Write {
                        storage_key,
                        source: Arc::new(err),
                    })
                }
            }
        })
    }
}

impl<V> fmt::Debug for Persistoid<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persistoid")
            .field("storage_key", &self.storage_key)
            .field("filter", &self.filter)
            .field("codec", &self.codec)
            .field("pipeline", &self.pipeline)
            .field("pending_keys", &self.tracker.queue().len())
            .field("staged_keys", &self.staged.len())
            .field("scheduler", &self.scheduler)
            .field("write", &self.write)
            .finish_non_exhaustive()
    }
}
