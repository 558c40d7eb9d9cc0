//! Orchestration layer for bulk draw collection.
//!
//! ## Submodules
//!
//! - [`config`] - CLI parsing and validated configuration.
//! - [`dispatch`] - Partitioning, submission, and unit processing.
//! - [`error`] - Unified error type.
//! - [`pool`] - Bounded worker pool.
//! - [`service`] - Run orchestration and reporting.
//! - [`shutdown`] - Shutdown state machine.
//! - [`telemetry`] - Structured logging and optional metrics.
//! - [`writer`] - Batching write queue and output sinks.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod pool;
pub mod service;
pub mod shutdown;
pub mod telemetry;
pub mod writer;
