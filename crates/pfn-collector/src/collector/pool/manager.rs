//! Bounded worker pool for unit processing.
//!
//! This module defines the [`WorkerPool`] struct, which owns a fixed set of
//! asynchronous workers responsible for processing [`WorkRequest`]s. Workers
//! share a single bounded queue, so submission order is preserved and any idle
//! worker takes the next unit. Completion order across workers is not
//! guaranteed.
//!
//! Shutdown is coordinated through a shared [`CancellationToken`] plus an
//! explicit acknowledgement from every worker.

use super::worker::worker_loop;
use crate::collector::{
    config::GenerationConfig,
    dispatch::{
        processor::UnitProcessor,
        request::{Completion, Unit, WorkRequest},
    },
    error::{Error, Result},
};
use core::time::Duration;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

/// A cooperative pool of asynchronous workers that process [`WorkRequest`]s.
///
/// Each worker runs one unit at a time; at most `num_workers` units compute
/// concurrently and at most `num_workers` more wait in the queue.
pub struct WorkerPool {
    queue: async_channel::Sender<WorkRequest>,
    num_workers: usize,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Spawns `num_workers` worker tasks on the current runtime.
    ///
    /// The queue holds one pending request per worker: enough to keep every
    /// worker busy while the dispatcher waits, without buffering the whole
    /// run in memory.
    pub fn spawn(
        num_workers: usize,
        config: Arc<GenerationConfig>,
        processor: UnitProcessor,
        shutdown_token: CancellationToken,
        shutdown_timeout: Duration,
    ) -> Self {
        let num_workers = num_workers.max(1);
        let (tx, rx) = async_channel::bounded(num_workers);

        for worker_id in 0..num_workers {
            tokio::spawn(worker_loop(
                worker_id,
                rx.clone(),
                Arc::clone(&config),
                Arc::clone(&processor),
                shutdown_token.clone(),
            ));
        }

        Self {
            queue: tx,
            num_workers,
            shutdown_token,
            shutdown_timeout,
        }
    }

    pub const fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Queues `unit` for the next free worker. The outcome is delivered on
    /// `completion_tx`.
    ///
    /// Waits while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The pool is shutting down (`shutdown_token` was cancelled).
    /// - The worker queue is closed.
    pub async fn submit(&self, unit: Unit, completion_tx: mpsc::Sender<Completion>) -> Result<()> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        self.queue
            .send(WorkRequest::Unit {
                unit,
                completion_tx,
            })
            .await
            .map_err(|_| Error::ChannelError {
                context: format!("Worker queue closed before {unit} was submitted"),
            })
    }

    /// Closes the queue without cancelling, so later submissions fail as if
    /// the workers had gone away.
    #[cfg(test)]
    pub(crate) fn close_queue(&self) {
        self.queue.close();
    }

    /// Gracefully shuts down all workers in the pool.
    ///
    /// - Queues a [`WorkRequest::Shutdown`] per worker behind any pending
    ///   units, so requests already accepted are still reported.
    /// - Waits up to `shutdown_timeout` for every acknowledgement.
    /// - Cancels the shared [`CancellationToken`] and closes the queue, so
    ///   stragglers stop picking up work.
    ///
    /// Calling this more than once is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        if self.queue.is_closed() {
            return Ok(());
        }

        // === Phase 1: Notify workers to shut down ===
        tracing::debug!("Notifying {} workers to shut down", self.num_workers);
        let notify = async {
            let mut handles = Vec::with_capacity(self.num_workers);
            for i in 0..self.num_workers {
                let (tx, rx) = oneshot::channel();
                if let Err(_e) = self.queue.send(WorkRequest::Shutdown { response: tx }).await {
                    tracing::error!("Failed to send shutdown to worker {i}: queue closed");
                } else {
                    handles.push((i, rx));
                }
            }

            // === Phase 2: Collect acknowledgements ===
            let acks = handles.into_iter().map(|(_i, rx)| async move {
                match rx.await {
                    Ok(()) => tracing::trace!("Worker shutdown {_i} acknowledged"),
                    Err(_e) => tracing::error!("Worker shutdown {_i} dropped: {_e}"),
                }
            });
            futures::future::join_all(acks).await;
        };

        let drained = timeout(self.shutdown_timeout, notify).await;

        // === Phase 3: Cancel any remaining work ===
        self.shutdown_token.cancel();
        self.queue.close();

        match drained {
            Ok(()) => {
                tracing::debug!("Worker pool shutdown complete");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(
                    "Worker pool shutdown timed out after {:?}",
                    self.shutdown_timeout
                );
                Err(Error::ChannelError {
                    context: String::from("timed out waiting for worker acknowledgements"),
                })
            }
        }
    }
}
