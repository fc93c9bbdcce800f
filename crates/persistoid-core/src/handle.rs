//! Handle on the most recent storage write

use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::{PersistError, Result};

/// Clonable future resolving when a write completes
///
/// Every clone observes the same outcome. Awaiting is optional: the write
/// runs on the tokio runtime whether or not anyone polls the handle.
#[derive(Clone)]
pub struct WriteHandle {
    inner: Shared<BoxFuture<'static, Result<()>>>,
    done: Arc<AtomicBool>,
    sequence: u64,
}

impl WriteHandle {
    /// Handle that is already resolved successfully (no write issued)
    pub fn settled() -> Self {
        Self::resolved(0, Ok(()))
    }

    /// Handle that is already resolved with `outcome`
    pub(crate) fn resolved(sequence: u64, outcome: Result<()>) -> Self {
        Self {
            inner: futures::future::ready(outcome).boxed().shared(),
            done: Arc::new(AtomicBool::new(true)),
            sequence,
        }
    }

    /// Run `write` on the tokio runtime and track its completion
    pub(crate) fn spawn<F>(sequence: u64, write: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        let task = tokio::spawn(async move {
            let outcome = write.await;
            flag.store(true, Ordering::Release);
            outcome
        });

        let inner = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(PersistError::WriteTask(e.to_string())),
            }
        }
        .boxed()
        .shared();

        Self {
            inner,
            done,
            sequence,
        }
    }

    /// True once the underlying write has finished, successfully or not
    pub fn is_settled(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Number of the write this handle tracks (0 when no write was issued)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Future for WriteHandle {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl Default for WriteHandle {
    fn default() -> Self {
        Self::settled()
    }
}

impl fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteHandle")
            .field("sequence", &self.sequence)
            .field("settled", &self.is_settled())
            .finish()
    }
}
