use crate::collector::dispatch::request::{Unit, WriteTask};
use std::collections::BTreeMap;

/// Re-sequences completions into unit order.
///
/// Units are contiguous, so the unit that may be released next always starts
/// at the index following the last released unit. Failed units release their
/// slot without producing output, so a failure never stalls later units.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    next_start: u64,
    pending: BTreeMap<u64, (Unit, Option<WriteTask>)>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts the completion of `unit` (`None` if it failed) and returns
    /// every task that is now in sequence.
    pub fn push(&mut self, unit: Unit, task: Option<WriteTask>) -> Vec<WriteTask> {
        self.pending.insert(unit.start, (unit, task));

        let mut ready = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            if *entry.key() != self.next_start {
                break;
            }
            let (unit, task) = entry.remove();
            self.next_start = unit.end + 1;
            ready.extend(task);
        }
        ready
    }

    /// Number of completions held back waiting for an earlier unit.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Releases everything still held, in unit order, skipping the gaps left
    /// by units that never completed.
    pub fn drain_remaining(self) -> Vec<WriteTask> {
        self.pending
            .into_values()
            .filter_map(|(_, task)| task)
            .collect()
    }
}
