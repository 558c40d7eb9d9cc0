//! The top-level collection run.
//!
//! [`Collector::run`] wires the pieces together:
//!
//! 1. A [`WorkerPool`] of `num_workers` workers.
//! 2. A [`WriteQueue`] task draining a bounded completion channel.
//! 3. A [`Dispatcher`] feeding units to the pool in index order.
//!
//! Once dispatch ends, for any reason, the run drains, flushes, and shuts the
//! pool down before reporting.

use crate::collector::{
    config::{CollectorConfig, OutputKind},
    dispatch::{
        coordinator::Dispatcher,
        processor::{UnitProcessor, default_processor},
    },
    error::{Error, Result},
    pool::manager::WorkerPool,
    shutdown::{RunState, ShutdownCoordinator, ShutdownReason},
    writer::{
        output::{LineSink, OutputFiles},
        queue::{WriteQueue, WriteReport},
    },
};
use core::time::Duration;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Outcome of a whole run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub units_total: u64,
    pub units_submitted: u64,
    /// Units that completed, successfully or not.
    pub units_processed: u64,
    pub units_failed: u64,
    pub units_skipped: u64,
    pub write_errors: u64,
    /// Indexed by [`OutputKind::index`].
    pub lines_written: [u64; 4],
    pub interrupted: bool,
    pub reason: ShutdownReason,
    pub elapsed: Duration,
}

impl RunReport {
    /// True when every unit was processed and written without error.
    pub fn is_success(&self) -> bool {
        self.reason == ShutdownReason::Completed
            && !self.interrupted
            && self.units_failed == 0
            && self.write_errors == 0
            && self.units_processed == self.units_total
    }

    pub const fn lines(&self, kind: OutputKind) -> u64 {
        self.lines_written[kind.index()]
    }

    fn log_summary(&self) {
        let secs = self.elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            self.units_processed as f64 / secs
        } else {
            0.0
        };
        tracing::info!(
            "Run {}: {}/{} units processed, {} failed, {} skipped, {} write errors in {:.3}s ({:.1} units/s)",
            self.reason,
            self.units_processed,
            self.units_total,
            self.units_failed,
            self.units_skipped,
            self.write_errors,
            secs,
            rate
        );
        for kind in OutputKind::ALL {
            let lines = self.lines(kind);
            if lines > 0 {
                tracing::info!("  {kind}: {lines} lines");
            }
        }
    }
}

/// Runs one collection end to end.
pub struct Collector {
    config: CollectorConfig,
    processor: UnitProcessor,
    coordinator: Arc<ShutdownCoordinator>,
}

impl Collector {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            processor: default_processor(),
            coordinator: Arc::new(ShutdownCoordinator::new()),
        }
    }

    /// Replaces the per-unit computation, e.g. to run a custom draw source.
    pub fn with_processor(mut self, processor: UnitProcessor) -> Self {
        self.processor = processor;
        self
    }

    pub const fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Handle for requesting shutdown from outside the run, e.g. from a
    /// signal handler.
    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Runs against the output files in [`CollectorConfig::run_dir`].
    ///
    /// # Errors
    ///
    /// Returns an error if the output files cannot be opened, or if the write
    /// queue task dies.
    pub async fn run(&self) -> Result<RunReport> {
        let dir = self.config.run_dir();
        let files = OutputFiles::open(&dir, &self.config.generation.outputs).await?;
        tracing::info!("Writing output to {}", files.dir().display());
        self.run_with_sink(files).await
    }

    /// Runs against an arbitrary [`LineSink`].
    ///
    /// # Errors
    ///
    /// Returns an error if the write queue task dies.
    pub async fn run_with_sink<S>(&self, sink: S) -> Result<RunReport>
    where
        S: LineSink + Send + 'static,
    {
        let started = Instant::now();
        let config = &self.config;
        let token = self.coordinator.token();

        let dispatcher = Dispatcher::new(config.count, config.chunk_size);
        let progress = dispatcher.progress();
        let (completion_tx, completion_rx) = mpsc::channel(config.queue_capacity.max(1));

        let pool = WorkerPool::spawn(
            config.num_workers,
            Arc::clone(&config.generation),
            Arc::clone(&self.processor),
            token.clone(),
            config.shutdown_timeout,
        );
        tracing::debug!(
            "Dispatching {} units of up to {} indices to {} workers",
            progress.total(),
            config.chunk_size,
            pool.num_workers()
        );

        let writer = WriteQueue::new(
            sink,
            config.batch_size,
            Arc::clone(&progress),
            config.ordered,
            Arc::clone(&self.coordinator),
        );
        let mut writer = tokio::spawn(writer.run(completion_rx));

        let units_submitted = match dispatcher.feed(&pool, completion_tx, &token).await {
            Ok(submitted) => {
                if submitted < progress.total() {
                    // Dispatch only stops short once a shutdown reason is set.
                    tracing::debug!("Dispatch ended after {submitted} units");
                }
                submitted
            }
            Err((submitted, e)) => {
                tracing::error!("Dispatch failed after {submitted} units: {e}");
                self.coordinator.request(ShutdownReason::Fatal(e.to_string()));
                submitted
            }
        };
        // Nothing new is admitted; in-flight units still finish and are
        // written. The run only counts as completed once the writer has seen
        // every unit.
        self.coordinator.advance(RunState::Draining);

        let joined = if token.is_cancelled() {
            // The writer only has to flush what it already holds.
            match tokio::time::timeout(config.shutdown_timeout, &mut writer).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!(
                        "Write queue did not flush within {:?}; abandoning it",
                        config.shutdown_timeout
                    );
                    writer.abort();
                    Ok(WriteReport {
                        write_errors: 1,
                        interrupted: true,
                        ..WriteReport::default()
                    })
                }
            }
        } else {
            writer.await
        };
        let write_report = joined.map_err(|e| Error::ChannelError {
            context: format!("write queue task failed: {e}"),
        });
        match &write_report {
            Ok(_) if progress.is_complete() => {
                self.coordinator.request(ShutdownReason::Completed);
            }
            // Keeps an earlier interrupt; otherwise the queue closed early.
            Ok(_) => self.coordinator.request(ShutdownReason::Fatal(format!(
                "completion queue closed after {} of {} units",
                progress.processed(),
                progress.total()
            ))),
            Err(e) => self.coordinator.request(ShutdownReason::Fatal(e.to_string())),
        }

        if let Err(e) = pool.shutdown().await {
            tracing::warn!("Worker pool did not shut down cleanly: {e}");
        }
        self.coordinator.terminate();
        let write_report = write_report?;

        let report = RunReport {
            units_total: progress.total(),
            units_submitted,
            units_processed: progress.processed(),
            units_failed: write_report.units_failed,
            units_skipped: write_report.units_skipped,
            write_errors: write_report.write_errors,
            lines_written: write_report.lines_written,
            interrupted: write_report.interrupted || self.coordinator.is_interrupted(),
            reason: self
                .coordinator
                .reason()
                .unwrap_or(ShutdownReason::Completed),
            elapsed: started.elapsed(),
        };
        report.log_summary();
        Ok(report)
    }
}
