//! Work partitioning, submission, and per-unit processing.
//!
//! ## Structure
//!
//! - [`request`] - Units, results, and worker messages.
//! - [`coordinator`] - Splits the total count into units, feeds them to the
//!   pool, and owns the completion counters.
//! - [`processor`] - Pure computation of one unit.

pub mod coordinator;
pub mod processor;
pub mod request;
