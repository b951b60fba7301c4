//! JSON-RPC chain client backed by an alloy provider.

use std::fmt;

use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::Filter;
use async_trait::async_trait;

use super::{ChainClient, RawLog};
use crate::error::AppError;

/// [`ChainClient`] over an HTTP (or WS) JSON-RPC endpoint.
#[derive(Clone)]
pub struct RpcChainClient {
    endpoint: String,
    provider: DynProvider,
}

impl RpcChainClient {
    /// Connects to the node at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the URL is invalid or the transport
    /// cannot be established.
    pub async fn connect(endpoint: &str) -> Result<Self, AppError> {
        let provider = ProviderBuilder::new()
            .connect(endpoint)
            .await
            .map_err(|e| AppError::Config(format!("cannot connect to rpc endpoint: {e}")))?;

        Ok(Self {
            endpoint: redact(endpoint),
            provider: DynProvider::new(provider),
        })
    }
}

impl fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_number(&self) -> Result<u64, AppError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| AppError::Chain(e.to_string()))
    }

    async fn filter_logs(
        &self,
        from: u64,
        to: u64,
        contract: Address,
    ) -> Result<Vec<RawLog>, AppError> {
        let filter = Filter::new()
            .address(contract)
            .from_block(from)
            .to_block(to);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| AppError::Chain(e.to_string()))?;

        Ok(logs.into_iter().map(RawLog::from).collect())
    }
}

/// Hosted RPC URLs usually end in an API key; keep it out of logs.
fn redact(endpoint: &str) -> String {
    match endpoint.rsplit_once('/') {
        Some((base, key)) if key.len() >= 16 => format!("{base}/***"),
        _ => endpoint.to_string(),
    }
}
