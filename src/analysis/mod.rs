//! Analysis modules.
//!
//! Helpers that summarize a finished workflow run.

pub mod aggregator;

pub use aggregator::*;
