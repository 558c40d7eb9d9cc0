//! Bounded worker pool for unit processing.
//!
//! - [`manager`] - [`WorkerPool`](manager::WorkerPool): submission and
//!   coordinated shutdown.
//! - [`worker`] - The per-worker receive loop.

pub mod manager;
pub mod worker;
