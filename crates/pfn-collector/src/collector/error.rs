//! Error types for the collector.
//!
//! This module defines the central `Error` enum covering the three failure
//! families a run can hit, none of which aborts the run on its own:
//!
//! - Generation: a draw or big-integer conversion failed inside a unit.
//! - Pool: a worker failed to return a result, or the pool is shutting down.
//! - Write: appending to an output stream failed.

use crate::collector::dispatch::request::Unit;
use std::sync::Arc;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the collector.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// Internal channel send/receive failure (e.g., closed or full channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// Draw derivation failed for a single index.
    #[error("Generation error at index {index}: {source}")]
    Generation {
        index: u64,
        #[source]
        source: pfn_core::Error,
    },

    /// A worker's unit computation panicked or was aborted.
    #[error("Worker {worker_id} failed on {unit}: {reason}")]
    WorkerFailed {
        worker_id: usize,
        unit: Unit,
        reason: String,
    },

    /// An output stream could not be opened, appended to, or flushed.
    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The collector is in the process of shutting down.
    #[error("Collector is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Wraps an [`std::io::Error`] with a short description of what failed.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }
}
