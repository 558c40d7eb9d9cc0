use super::{output::LineSink, reorder::ReorderBuffer};
use crate::collector::{
    config::OutputKind,
    dispatch::{
        coordinator::Progress,
        request::{Completion, WriteTask},
    },
    error::Error,
    shutdown::{RunState, ShutdownCoordinator},
    telemetry,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Totals accumulated by a [`WriteQueue`] over a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Successful units whose lines were handed to the sink.
    pub units_written: u64,
    /// Units that completed with an error and produced no output.
    pub units_failed: u64,
    /// Units rejected unprocessed because the run was shutting down.
    pub units_skipped: u64,
    /// Failed appends and flushes.
    pub write_errors: u64,
    /// Lines appended per [`OutputKind`], indexed by [`OutputKind::index`].
    pub lines_written: [u64; 4],
    /// The writer stopped on a cancellation rather than after the last unit.
    pub interrupted: bool,
}

/// Single consumer that turns [`Completion`]s into appended lines.
///
/// Completions are taken in FIFO batches of up to `batch_size`. Each batch is
/// appended stream by stream in [`OutputKind::ALL`] order and then flushed, so
/// lines of one unit stay contiguous within each stream and a batch is durable
/// before the next one is taken. Write failures are counted and logged; they
/// never stop the queue.
pub struct WriteQueue<S> {
    sink: S,
    batch_size: usize,
    progress: Arc<Progress>,
    reorder: Option<ReorderBuffer>,
    coordinator: Arc<ShutdownCoordinator>,
    report: WriteReport,
}

impl<S: LineSink> WriteQueue<S> {
    pub fn new(
        sink: S,
        batch_size: usize,
        progress: Arc<Progress>,
        ordered: bool,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Self {
        Self {
            sink,
            batch_size: batch_size.max(1),
            progress,
            reorder: ordered.then(ReorderBuffer::new),
            coordinator,
            report: WriteReport::default(),
        }
    }

    /// Drains `rx` until every unit is accounted for, the channel closes, or
    /// the run is cancelled.
    ///
    /// On cancellation, completions that already arrived are still written.
    /// The run is moved to [`RunState::Flushing`] before the final flush.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Completion>) -> WriteReport {
        let token = self.coordinator.token();
        let mut batch = Vec::with_capacity(self.batch_size);

        while !self.progress.is_complete() {
            let received = tokio::select! {
                biased;
                () = token.cancelled() => {
                    self.report.interrupted = true;
                    break;
                }
                n = rx.recv_many(&mut batch, self.batch_size) => n,
            };
            if received == 0 {
                tracing::debug!("Completion queue closed");
                break;
            }
            self.write_batch(&mut batch).await;
        }

        if self.report.interrupted {
            while let Ok(completion) = rx.try_recv() {
                batch.push(completion);
            }
            if !batch.is_empty() {
                tracing::info!("Writing {} completions received before shutdown", batch.len());
                self.write_batch(&mut batch).await;
            }
        }
        drop(rx);

        self.coordinator.advance(RunState::Flushing);
        if let Some(reorder) = self.reorder.take() {
            let held = reorder.drain_remaining();
            if !held.is_empty() {
                tracing::warn!("Releasing {} out-of-sequence units", held.len());
                self.append(held).await;
            }
        }
        self.flush().await;

        self.report
    }

    async fn write_batch(&mut self, batch: &mut Vec<Completion>) {
        let mut ready = Vec::with_capacity(batch.len());

        for Completion { unit, outcome } in batch.drain(..) {
            let task = match outcome {
                Ok(result) => {
                    self.progress.record(true);
                    telemetry::increment_units_processed();
                    Some(WriteTask { unit, result })
                }
                Err(Error::ServiceShutdown) => {
                    tracing::debug!("{unit} skipped: shutting down");
                    self.report.units_skipped += 1;
                    continue;
                }
                Err(e) => {
                    self.progress.record(false);
                    telemetry::increment_units_processed();
                    telemetry::increment_units_failed();
                    tracing::error!("{unit} failed: {e}");
                    self.report.units_failed += 1;
                    None
                }
            };

            match self.reorder.as_mut() {
                Some(reorder) => ready.extend(reorder.push(unit, task)),
                None => ready.extend(task),
            }
        }

        if !ready.is_empty() {
            self.append(ready).await;
        }
        self.flush().await;

        tracing::debug!(
            "{}/{} units processed",
            self.progress.processed(),
            self.progress.total()
        );
    }

    async fn append(&mut self, mut tasks: Vec<WriteTask>) {
        self.report.units_written += tasks.len() as u64;

        for kind in OutputKind::ALL {
            let mut lines = Vec::new();
            for task in &mut tasks {
                lines.append(task.result.lines_mut(kind));
            }
            if lines.is_empty() {
                continue;
            }

            match self.sink.append(kind, &lines).await {
                Ok(()) => {
                    let count = lines.len() as u64;
                    self.report.lines_written[kind.index()] += count;
                    telemetry::increment_lines_written(count);
                }
                Err(e) => {
                    self.report.write_errors += 1;
                    telemetry::increment_write_errors();
                    tracing::error!("Failed to append {} {kind} lines: {e}", lines.len());
                }
            }
        }
    }

    async fn flush(&mut self) {
        if let Err(e) = self.sink.flush().await {
            self.report.write_errors += 1;
            telemetry::increment_write_errors();
            tracing::error!("Failed to flush output: {e}");
        }
    }
}
