//! # `pfn-core`: Provably-Fair Number Draws
//!
//! Deterministic draw derivation used by the collector. A draw source is
//! constructed from a seed string and yields reproducible floats in `[0, 1)`
//! for every `(seed, nonce)` pair. Identical inputs always produce identical
//! draws, which is what makes a published set verifiable after the fact.
//!
//! ## Module Overview
//!
//! - [`DrawSource`] - The capability consumed by unit processing.
//! - [`ProvablyFairNumbers`] - SHA-256 backed implementation with a public
//!   server seed commitment.
//! - [`undivided`] - Exact `raw × 2^256` conversion into a [`U256`].

mod draw;
mod error;
mod undivided;

pub use crate::draw::*;
pub use crate::error::*;
pub use crate::undivided::*;
// Re-export so downstream crates can name the big-integer type without a
// direct dependency.
pub use alloy_primitives::U256;
