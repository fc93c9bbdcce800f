//! Failure reporting for non-fatal persistence errors

use std::fmt;

use crate::error::{CodecError, StorageError};

/// Receives errors the engine recovers from on its own
///
/// Neither method may block: both are called from the processing cycle or
/// from the task driving a write.
pub trait FailureReporter: Send + Sync + fmt::Debug {
    /// A value could not be encoded; its previous staged value is kept
    fn encode_failed(&self, key: &str, error: &CodecError);

    /// The backend rejected a write; it will not be retried
    fn write_failed(&self, storage_key: &str, error: &StorageError);
}

/// Default reporter logging through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn encode_failed(&self, key: &str, error: &CodecError) {
        tracing::error!("Error serializing state for key '{}': {}", key, error);
    }

    fn write_failed(&self, storage_key: &str, error: &StorageError) {
        tracing::error!("Error storing data under '{}': {}", storage_key, error);
    }
}
