use crate::collector::{config::OutputKind, error::Result};
use core::fmt;
use core::ops::RangeInclusive;
use tokio::sync::{mpsc, oneshot};

/// An inclusive range of indices processed by a single worker invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Unit {
    pub start: u64,
    pub end: u64,
}

#[allow(clippy::len_without_is_empty)]
impl Unit {
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of indices covered (`end - start + 1`). Never zero.
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub const fn indices(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk-{}-{}", self.start, self.end)
    }
}

/// Pre-joined output lines for one unit, one line per index per enabled kind.
///
/// Lines are positionally aligned: line `i` of every enabled kind belongs to
/// index `unit.start + i`. Disabled kinds stay empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitResult {
    pub scaled: Vec<String>,
    pub unscaled: Vec<String>,
    pub undivided: Vec<String>,
    pub raw: Vec<String>,
}

impl UnitResult {
    pub fn lines(&self, kind: OutputKind) -> &[String] {
        match kind {
            OutputKind::Scaled => &self.scaled,
            OutputKind::Unscaled => &self.unscaled,
            OutputKind::Undivided => &self.undivided,
            OutputKind::Raw => &self.raw,
        }
    }

    pub fn lines_mut(&mut self, kind: OutputKind) -> &mut Vec<String> {
        match kind {
            OutputKind::Scaled => &mut self.scaled,
            OutputKind::Unscaled => &mut self.unscaled,
            OutputKind::Undivided => &mut self.undivided,
            OutputKind::Raw => &mut self.raw,
        }
    }
}

/// A successful [`UnitResult`] tagged with its originating [`Unit`], queued for
/// durable append.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteTask {
    pub unit: Unit,
    pub result: UnitResult,
}

/// The outcome of one submitted unit, delivered in completion order.
///
/// Every submitted unit yields exactly one `Completion`, successful or not, so
/// completion accounting always balances.
#[derive(Debug)]
pub struct Completion {
    pub unit: Unit,
    pub outcome: Result<UnitResult>,
}

/// A message sent from the worker pool to an individual worker task.
///
/// [`WorkRequest`]s travel over a bounded queue shared by all workers and are
/// consumed by each worker's main loop, one at a time.
#[derive(Debug)]
pub enum WorkRequest {
    /// Compute `unit` and report the outcome on `completion_tx`.
    Unit {
        unit: Unit,
        completion_tx: mpsc::Sender<Completion>,
    },

    /// Request the worker to shut down gracefully.
    ///
    /// - `response`: One-shot channel for acknowledging that the worker has
    ///   completed its shutdown routine.
    Shutdown { response: oneshot::Sender<()> },
}
