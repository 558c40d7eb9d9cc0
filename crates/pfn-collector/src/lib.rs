//! # `pfn-collector`: Bulk Provably-Fair Draw Collection
//!
//! `pfn-collector` generates large numbers of deterministic draw sets (for
//! example 90 distinct balls out of 1..=90 per index) and appends them to flat
//! text files. Each index is seeded by its own decimal form, so any line can be
//! re-derived and verified independently with [`pfn_core`].
//!
//! ## Highlights
//!
//! - **Fixed-size units**: the total count is partitioned into contiguous
//!   index ranges that cover `[0, count)` exactly once.
//! - **Bounded worker pool**: each worker computes one unit at a time on the
//!   blocking thread pool; dispatch order is strictly increasing.
//! - **Batching write queue**: results arrive in completion order and are
//!   appended in FIFO batches by a single writer, optionally re-sequenced into
//!   unit order.
//! - **Single shutdown path**: completion, signals, and fatal errors all drive
//!   the same `Running → Draining → Flushing → Terminated` state machine.
//!
//! ## Module Overview
//!
//! - [`collector::config`] - CLI arguments and validated run configuration.
//! - [`collector::dispatch`] - Unit partitioning, progress accounting, and
//!   per-unit processing.
//! - [`collector::pool`] - Worker pool and worker loop.
//! - [`collector::writer`] - Write queue, reorder buffer, and output sinks.
//! - [`collector::shutdown`] - Shutdown coordinator.
//! - [`collector::service`] - [`Collector`](collector::service::Collector),
//!   which wires everything together.

pub mod collector;
