//! lendstream indexer entry point.
//!
//! Runs one indexer loop for the configured chain and contract until
//! Ctrl-C or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use lendstream::chain::{ChainClient, RpcChainClient};
use lendstream::config::IndexerConfig;
use lendstream::decoder::EventProcessor;
use lendstream::indexer::{IndexerLoop, LoopExit};
use lendstream::notify::Notifier;
use lendstream::persistence::{CheckpointStore, NotificationQueue, PostgresStore, SnapshotStore};
use lendstream::shutdown::shutdown_signal;
use lendstream::telemetry::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = IndexerConfig::from_env().context("loading indexer configuration")?;
    init_tracing(config.log_format);
    tracing::info!(
        chain = %config.chain_name,
        chain_id = config.chain_id,
        contract = %config.contract,
        tokens = config.token_types.len(),
        "starting lendstream indexer"
    );

    let pool = config
        .database
        .connect()
        .await
        .context("connecting to postgres")?;
    let store = Arc::new(PostgresStore::new(pool));
    if config.database.run_migrations {
        store.migrate().await.context("running migrations")?;
    }

    let chain = RpcChainClient::connect(&config.rpc_url)
        .await
        .context("connecting to chain rpc")?;

    let processor = EventProcessor::new(
        Arc::clone(&store) as Arc<dyn SnapshotStore>,
        config.token_types.clone(),
    );
    let notifier = Notifier::new(
        Arc::clone(&store) as Arc<dyn NotificationQueue>,
        config.queue_key.clone(),
    );

    let cancel = CancellationToken::new();
    let handle = IndexerLoop::new(
        Arc::new(chain) as Arc<dyn ChainClient>,
        Arc::clone(&store) as Arc<dyn CheckpointStore>,
        processor,
        notifier,
        config.settings(),
        cancel.clone(),
    )
    .start();

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    match handle.await.context("indexer task panicked")? {
        Ok(LoopExit::Cancelled) => tracing::info!("indexer stopped"),
        Ok(LoopExit::CheckpointNotReady) => {
            tracing::warn!("checkpoint not ready, indexer exited without processing");
        }
        Err(e) => return Err(e).context("indexer loop failed"),
    }
    Ok(())
}
