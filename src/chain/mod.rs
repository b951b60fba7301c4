//! Chain access: the raw log shape and the RPC capability the indexer needs.
//!
//! The indexer never talks to a node directly. It goes through
//! [`ChainClient`], which production code backs with [`RpcChainClient`] and
//! tests back with scripted fakes.

pub mod rpc;

use alloy::primitives::{Address, B256, Bytes};
use async_trait::async_trait;

use crate::error::AppError;

pub use rpc::RpcChainClient;

/// A contract log as returned by range-bounded log filtering.
///
/// Consumed once by the decoder and then dropped; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    /// Emitting contract.
    pub address: Address,
    /// Topic hashes; `topics[0]` is the event signature.
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed fields.
    pub data: Bytes,
    /// Transaction that emitted the log.
    pub tx_hash: B256,
    /// Block containing the transaction.
    pub block_number: u64,
    /// Position of the log within its block.
    pub log_index: u64,
}

impl RawLog {
    /// Returns the event signature hash, if the log has any topics.
    #[must_use]
    pub fn signature(&self) -> Option<&B256> {
        self.topics.first()
    }
}

impl From<alloy::rpc::types::Log> for RawLog {
    fn from(log: alloy::rpc::types::Log) -> Self {
        Self {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            tx_hash: log.transaction_hash.unwrap_or_default(),
            block_number: log.block_number.unwrap_or_default(),
            log_index: log.log_index.unwrap_or_default(),
        }
    }
}

/// Read-only chain capability used by the indexer loop.
///
/// Both calls may fail with a transient error; the loop decides whether to
/// retry in place or skip forward.
#[async_trait]
pub trait ChainClient: Send + Sync + std::fmt::Debug {
    /// Current chain head height.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Chain`] when the node is unreachable or errors.
    async fn block_number(&self) -> Result<u64, AppError>;

    /// Logs emitted by `contract` in the inclusive block range `[from, to]`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Chain`] when the node rejects or fails the query.
    async fn filter_logs(
        &self,
        from: u64,
        to: u64,
        contract: Address,
    ) -> Result<Vec<RawLog>, AppError>;
}
