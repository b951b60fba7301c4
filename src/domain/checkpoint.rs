//! Per-chain indexing checkpoint.

use serde::{Deserialize, Serialize};

/// Durable record of indexing progress for one chain.
///
/// `last_indexed_block` is the inclusive lower bound of the next range to
/// fetch. It only ever moves forward and is written exclusively by the
/// indexer loop that owns the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Chain identifier (e.g. `1` for Ethereum mainnet).
    pub chain_id: i64,
    /// Next block to process, inclusive.
    pub last_indexed_block: u64,
    /// Unix seconds recorded when the checkpoint was seeded.
    pub last_indexed_time: i64,
}

impl Checkpoint {
    /// Creates a checkpoint value.
    #[must_use]
    pub const fn new(chain_id: i64, last_indexed_block: u64, last_indexed_time: i64) -> Self {
        Self {
            chain_id,
            last_indexed_block,
            last_indexed_time,
        }
    }

    /// Returns `true` when the checkpoint may be used for incremental
    /// indexing at `now` (unix seconds).
    ///
    /// A timestamp that is not strictly in the past is treated as a sentinel
    /// for "not yet valid" and the loop refuses to start.
    #[must_use]
    pub const fn is_ready(&self, now: i64) -> bool {
        self.last_indexed_time < now
    }
}
