//! Checkpointed block-range indexer.

pub mod backoff;
pub mod range;
pub mod service;

use alloy::primitives::Address;

pub use backoff::RetryPolicy;
pub use range::{BlockRange, next_range};
pub use service::{IndexerLoop, LoopExit};

/// Static parameters of one indexer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexerSettings {
    /// Chain whose checkpoint row drives the loop.
    pub chain_id: i64,
    /// Contract whose logs are indexed.
    pub contract: Address,
    /// Blocks added to the lower bound to form the upper bound.
    pub window: u64,
    /// Backoff for transient backend failures.
    pub retry: RetryPolicy,
}
