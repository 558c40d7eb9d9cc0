use crate::collector::{
    config::GenerationConfig,
    dispatch::{
        processor::UnitProcessor,
        request::{Completion, Unit, UnitResult, WorkRequest},
    },
    error::{Error, Result},
    telemetry::record_unit_duration,
};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Worker task responsible for processing [`WorkRequest`] messages.
///
/// All workers pull from one shared queue, so an idle worker always picks up
/// the next pending unit. A worker handles exactly one unit at a time: the
/// unit is computed on the blocking thread pool and the worker does not
/// receive again until it has reported the [`Completion`].
///
/// # Arguments
///
/// - `worker_id`: Numeric identifier for this worker (used for logs).
/// - `rx`: Shared receiver through which [`WorkRequest`]s arrive.
/// - `config`: Read-only generation settings shared by every worker.
/// - `processor`: Computes each unit on the blocking thread pool.
/// - `shutdown_token`: Once cancelled, queued units are reported as
///   [`Error::ServiceShutdown`] without being computed.
///
/// # Request Types
///
/// - [`WorkRequest::Unit`] - Compute a unit and report on its completion
///   channel.
/// - [`WorkRequest::Shutdown`] - Acknowledge and stop.
pub async fn worker_loop(
    worker_id: usize,
    rx: async_channel::Receiver<WorkRequest>,
    config: Arc<GenerationConfig>,
    processor: UnitProcessor,
    shutdown_token: CancellationToken,
) {
    tracing::trace!("Worker {worker_id} started");

    while let Ok(work) = rx.recv().await {
        match work {
            WorkRequest::Unit {
                unit,
                completion_tx,
            } => {
                let outcome = if shutdown_token.is_cancelled() {
                    Err(Error::ServiceShutdown)
                } else {
                    run_unit(worker_id, unit, Arc::clone(&config), Arc::clone(&processor)).await
                };

                if let Err(_e) = completion_tx.send(Completion { unit, outcome }).await {
                    tracing::debug!("Worker {worker_id} could not report {unit}: queue closed");
                }
            }
            WorkRequest::Shutdown { response } => {
                tracing::debug!("Worker {worker_id} received shutdown signal");

                if response.send(()).is_err() {
                    tracing::error!("Worker {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    tracing::trace!("Worker {worker_id} stopped");
}

/// Computes `unit` off the async executor and times it.
async fn run_unit(
    worker_id: usize,
    unit: Unit,
    config: Arc<GenerationConfig>,
    processor: UnitProcessor,
) -> Result<UnitResult> {
    let started = Instant::now();
    let log_timing = config.log_timing;

    let outcome = tokio::task::spawn_blocking(move || {
        let _span = tracing::info_span!("unit", worker_id, start = unit.start, end = unit.end)
            .entered();
        processor(unit, &config)
    })
    .await
    .map_err(|e| Error::WorkerFailed {
        worker_id,
        unit,
        reason: e.to_string(),
    })?;

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    record_unit_duration(elapsed_ms);
    if log_timing {
        tracing::info!("{unit}: {elapsed_ms:.3}ms");
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::dispatch::processor::default_processor;
    use tokio::sync::{mpsc, oneshot};

    fn config() -> Arc<GenerationConfig> {
        Arc::new(GenerationConfig {
            size: 3,
            min: 1,
            max: 10,
            ..GenerationConfig::default()
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn computes_units_then_acknowledges_shutdown() {
        let (tx, rx) = async_channel::bounded(4);
        let handle = tokio::spawn(worker_loop(
            0,
            rx,
            config(),
            default_processor(),
            CancellationToken::new(),
        ));
        let (completion_tx, mut completion_rx) = mpsc::channel(4);

        tx.send(WorkRequest::Unit {
            unit: Unit::new(0, 2),
            completion_tx: completion_tx.clone(),
        })
        .await
        .unwrap();
        let completion = completion_rx.recv().await.unwrap();
        assert_eq!(completion.unit, Unit::new(0, 2));
        let result = completion.outcome.unwrap();
        assert_eq!(result.scaled.len(), 3);
        assert_eq!(result.unscaled.len(), 3);
        assert!(result.undivided.is_empty());

        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(WorkRequest::Shutdown { response: ack_tx })
            .await
            .unwrap();
        ack_rx.await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_worker_rejects_queued_units() {
        let (tx, rx) = async_channel::bounded(4);
        let token = CancellationToken::new();
        token.cancel();
        let handle = tokio::spawn(worker_loop(1, rx, config(), default_processor(), token));
        let (completion_tx, mut completion_rx) = mpsc::channel(4);

        tx.send(WorkRequest::Unit {
            unit: Unit::new(5, 9),
            completion_tx,
        })
        .await
        .unwrap();
        let completion = completion_rx.recv().await.unwrap();
        assert!(matches!(completion.outcome, Err(Error::ServiceShutdown)));

        drop(tx);
        handle.await.unwrap();
    }
}
