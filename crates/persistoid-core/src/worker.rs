//! Background worker driving a [`Persistoid`] on the tokio runtime
//!
//! The worker owns the instance; producers talk to it through a clonable
//! [`PersistHandle`]. Updates are fire-and-forget, flushes return the
//! [`WriteHandle`] of the newest write.

use serde::Serialize;
use std::fmt;
use std::future::pending;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{PersistError, Result};
use crate::handle::WriteHandle;
use crate::persistoid::Persistoid;
use crate::snapshot::Snapshot;

enum Command<V> {
    Update(Snapshot<V>),
    Flush(oneshot::Sender<WriteHandle>),
}

/// Producer side of a spawned persist worker
pub struct PersistHandle<V> {
    tx: mpsc::UnboundedSender<Command<V>>,
}

impl<V> Clone for PersistHandle<V> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<V> fmt::Debug for PersistHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<V> PersistHandle<V> {
    /// Send a new snapshot; never blocks
    pub fn update(&self, snapshot: Snapshot<V>) {
        if self.tx.send(Command::Update(snapshot)).is_err() {
            tracing::warn!("Persist worker stopped, update dropped");
        }
    }

    /// Ask for a flush and get the handle of the resulting write
    pub async fn flush_handle(&self) -> Result<WriteHandle> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply))
            .map_err(|_| PersistError::WorkerClosed)?;
        response.await.map_err(|_| PersistError::WorkerClosed)
    }

    /// Flush and wait until the write completes
    pub async fn flush(&self) -> Result<()> {
        self.flush_handle().await?.await
    }

    /// Check whether the worker is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Move `persistoid` onto a background task
///
/// The task stops once every [`PersistHandle`] is dropped, after draining
/// pending work and waiting for the last write.
pub fn spawn<V>(persistoid: Persistoid<V>) -> (PersistHandle<V>, JoinHandle<()>)
where
    V: Serialize + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(persistoid, rx));
    (PersistHandle { tx }, task)
}

async fn run<V>(mut persistoid: Persistoid<V>, mut rx: mpsc::UnboundedReceiver<Command<V>>)
where
    V: Serialize + Send + Sync + 'static,
{
    tracing::debug!("Persist worker started for '{}'", persistoid.storage_key());

    loop {
        let deadline = persistoid.next_deadline();

        tokio::select! {
            biased;

            command = rx.recv() => match command {
                Some(Command::Update(snapshot)) => persistoid.update(snapshot),
                Some(Command::Flush(reply)) => {
                    // The requester may have given up; the write still happens
                    let _ = reply.send(persistoid.flush());
                }
                None => break,
            },

            _ = sleep_until(deadline) => {
                persistoid.run_due(Instant::now());
            }
        }
    }

    persistoid.flush();
    if let Err(e) = persistoid.write_handle().await {
        tracing::warn!(
            "Final write for '{}' failed: {}",
            persistoid.storage_key(),
            e
        );
    }
    tracing::debug!("Persist worker for '{}' stopped", persistoid.storage_key());
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => pending().await,
    }
}
