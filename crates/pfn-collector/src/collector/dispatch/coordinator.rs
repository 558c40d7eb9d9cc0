use super::request::{Completion, Unit};
use crate::collector::{error::Error, pool::manager::WorkerPool};
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Iterator over the contiguous [`Unit`]s covering `[0, count)`.
///
/// Every unit but the last spans exactly `chunk_size` indices; the last one
/// absorbs the remainder.
#[derive(Clone, Debug)]
pub struct Units {
    next: u64,
    count: u64,
    chunk_size: u64,
}

impl Iterator for Units {
    type Item = Unit;

    fn next(&mut self) -> Option<Unit> {
        if self.next >= self.count {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(self.chunk_size).min(self.count) - 1;
        self.next = end + 1;
        Some(Unit::new(start, end))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = unit_count(self.count - self.next.min(self.count), self.chunk_size);
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Units {}

/// Splits `[0, count)` into units of `chunk_size` indices.
///
/// `chunk_size` is clamped into `1..=count`, so an oversized chunk yields a
/// single unit.
pub fn partition(count: u64, chunk_size: u64) -> Units {
    Units {
        next: 0,
        count,
        chunk_size: chunk_size.clamp(1, count.max(1)),
    }
}

/// Number of units `partition(count, chunk_size)` yields:
/// `ceil(count / chunk_size)`.
pub fn unit_count(count: u64, chunk_size: u64) -> u64 {
    count.div_ceil(chunk_size.clamp(1, count.max(1)))
}

/// Completion accounting for a run.
///
/// `total` is fixed when the work is partitioned. `processed` is bumped once
/// per [`Completion`], whether the unit succeeded or failed, so the run is
/// complete exactly when `processed == total`.
#[derive(Debug)]
pub struct Progress {
    total: u64,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl Progress {
    pub const fn new(total: u64) -> Self {
        Self {
            total,
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub const fn total(&self) -> u64 {
        self.total
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Acquire)
    }

    /// Records one completion and returns the new processed count.
    pub fn record(&self, succeeded: bool) -> u64 {
        if !succeeded {
            self.failed.fetch_add(1, Ordering::AcqRel);
        }
        self.processed.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_complete(&self) -> bool {
        self.processed() >= self.total
    }
}

/// Partitions a run into units and submits them to the [`WorkerPool`].
///
/// The dispatcher owns the run's [`Progress`]. The total is known as soon as the
/// dispatcher is built; the write queue records completions against it.
pub struct Dispatcher {
    units: Units,
    progress: Arc<Progress>,
}

impl Dispatcher {
    pub fn new(count: u64, chunk_size: u64) -> Self {
        let units = partition(count, chunk_size);
        let progress = Arc::new(Progress::new(unit_count(count, chunk_size)));
        Self { units, progress }
    }

    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Submits every unit to the pool in increasing index order.
    ///
    /// Each submission waits for room in the pool's queue, so at most a
    /// bounded number of units are pending at once. When a submission is
    /// rejected by the pool, the dispatcher reports the unit as failed on
    /// `completion_tx` itself so that accounting still balances.
    ///
    /// The sender is dropped on return; once the workers finish their last
    /// units, the completion channel closes.
    ///
    /// Returns the number of units handed to the pool. If `shutdown_token` is
    /// cancelled first, dispatch stops early and units not yet submitted are
    /// never reported.
    ///
    /// # Errors
    ///
    /// Returns the number of units submitted so far together with the error
    /// if the completion channel closed while a rejected unit was being
    /// reported.
    pub async fn feed(
        self,
        pool: &WorkerPool,
        completion_tx: mpsc::Sender<Completion>,
        shutdown_token: &CancellationToken,
    ) -> core::result::Result<u64, (u64, Error)> {
        let mut submitted = 0;

        for unit in self.units {
            let submission = tokio::select! {
                biased;
                () = shutdown_token.cancelled() => Err(Error::ServiceShutdown),
                res = pool.submit(unit, completion_tx.clone()) => res,
            };

            if let Err(e) = submission {
                if matches!(e, Error::ServiceShutdown) {
                    tracing::warn!("Dispatch stopped before {unit}: {submitted} units submitted");
                    break;
                }
                tracing::error!("Failed to submit {unit}: {e}");
                if completion_tx
                    .send(Completion {
                        unit,
                        outcome: Err(e),
                    })
                    .await
                    .is_err()
                {
                    return Err((
                        submitted,
                        Error::ChannelError {
                            context: String::from("completion channel closed during dispatch"),
                        },
                    ));
                }
            }
            submitted += 1;
        }

        Ok(submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::dispatch::processor::default_processor;

    fn covered(units: &[Unit]) -> u64 {
        units.iter().map(Unit::len).sum()
    }

    #[test]
    fn partition_is_contiguous_and_exact() {
        for count in 1..=40_u64 {
            for chunk in 1..=45_u64 {
                let units: Vec<_> = partition(count, chunk).collect();
                assert_eq!(units.len() as u64, count.div_ceil(chunk.min(count)));
                assert_eq!(units.len() as u64, unit_count(count, chunk));
                assert_eq!(units.first().map(|u| u.start), Some(0));
                assert_eq!(units.last().map(|u| u.end), Some(count - 1));
                for pair in units.windows(2) {
                    assert_eq!(pair[0].end + 1, pair[1].start);
                }
                assert_eq!(covered(&units), count);
            }
        }
    }

    #[test]
    fn oversized_chunk_yields_single_unit() {
        let units: Vec<_> = partition(1, 50).collect();
        assert_eq!(units, [Unit::new(0, 0)]);
    }

    #[test]
    fn remainder_lands_in_last_unit() {
        let units: Vec<_> = partition(3, 2).collect();
        assert_eq!(units, [Unit::new(0, 1), Unit::new(2, 2)]);
    }

    #[test]
    fn size_hint_is_exact() {
        let mut units = partition(10, 3);
        assert_eq!(units.len(), 4);
        units.next();
        assert_eq!(units.len(), 3);
        units.by_ref().for_each(drop);
        assert_eq!(units.len(), 0);
    }

    #[test]
    fn zero_count_yields_nothing() {
        assert_eq!(partition(0, 5).count(), 0);
        assert_eq!(unit_count(0, 5), 0);
    }

    #[test]
    fn progress_completes_on_last_record() {
        let progress = Progress::new(3);
        assert_eq!(progress.record(true), 1);
        assert_eq!(progress.record(false), 2);
        assert!(!progress.is_complete());
        assert_eq!(progress.record(true), 3);
        assert!(progress.is_complete());
        assert_eq!(progress.failed(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn feed_reports_every_unit_once() {
        use crate::collector::config::GenerationConfig;
        use core::time::Duration;

        let token = CancellationToken::new();
        let generation = Arc::new(GenerationConfig {
            size: 2,
            min: 1,
            max: 5,
            ..GenerationConfig::default()
        });
        let pool = WorkerPool::spawn(
            2,
            generation,
            default_processor(),
            token.clone(),
            Duration::from_secs(3),
        );
        let dispatcher = Dispatcher::new(7, 3);
        let (completion_tx, mut completion_rx) = mpsc::channel(8);

        let submitted = dispatcher.feed(&pool, completion_tx, &token).await.unwrap();
        assert_eq!(submitted, 3);

        let mut units = Vec::new();
        while let Some(completion) = completion_rx.recv().await {
            assert!(completion.outcome.is_ok());
            units.push(completion.unit);
        }
        units.sort();
        assert_eq!(units, partition(7, 3).collect::<Vec<_>>());
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_feed_submits_nothing() {
        use crate::collector::config::GenerationConfig;
        use core::time::Duration;

        let token = CancellationToken::new();
        token.cancel();
        let pool = WorkerPool::spawn(
            1,
            Arc::new(GenerationConfig::default()),
            default_processor(),
            token.clone(),
            Duration::from_secs(1),
        );
        let (completion_tx, mut completion_rx) = mpsc::channel(1);

        let submitted = Dispatcher::new(10, 2)
            .feed(&pool, completion_tx, &token)
            .await
            .unwrap();
        assert_eq!(submitted, 0);
        assert!(completion_rx.recv().await.is_none());
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn closed_completion_channel_keeps_partial_count() {
        use crate::collector::config::GenerationConfig;
        use core::time::Duration;

        let token = CancellationToken::new();
        let pool = WorkerPool::spawn(
            1,
            Arc::new(GenerationConfig::default()),
            default_processor(),
            token.clone(),
            Duration::from_secs(1),
        );
        // Every submission is rejected, so the dispatcher reports each unit
        // itself until the receiver goes away after two reports.
        pool.close_queue();
        let (completion_tx, mut completion_rx) = mpsc::channel::<Completion>(1);
        let reader = tokio::spawn(async move {
            for _ in 0..2 {
                let completion = completion_rx.recv().await.unwrap();
                assert!(matches!(completion.outcome, Err(Error::ChannelError { .. })));
            }
        });

        let (submitted, err) = Dispatcher::new(10, 2)
            .feed(&pool, completion_tx, &token)
            .await
            .unwrap_err();
        reader.await.unwrap();

        assert!((2..=3).contains(&submitted), "{submitted}");
        assert!(matches!(err, Error::ChannelError { .. }));
    }

    #[test]
    fn dispatcher_total_is_known_up_front() {
        let dispatcher = Dispatcher::new(101, 10);
        assert_eq!(dispatcher.progress().total(), 11);
        assert_eq!(dispatcher.progress().processed(), 0);
    }
}
