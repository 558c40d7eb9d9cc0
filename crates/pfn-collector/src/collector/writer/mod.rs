//! Durable output for completed units.
//!
//! ```text
//!   Worker 1 ──┐
//!   Worker 2 ──┼──> [bounded completion queue] ──> [WriteQueue] ──> LineSink
//!   Worker N ──┘        (completion order)          (single writer)
//! ```
//!
//! A single [`queue::WriteQueue`] drains completions in FIFO batches and
//! appends each batch to every enabled stream in the fixed order scaled,
//! unscaled, undivided, raw. With ordering enabled, a
//! [`reorder::ReorderBuffer`] holds results back until every earlier unit has
//! completed.

pub mod output;
pub mod queue;
pub mod reorder;
