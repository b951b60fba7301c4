//! lendstream server entry point.
//!
//! Serves the read API and WebSocket endpoint, runs the push hub, and
//! bridges indexer notifications to connected clients.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use lendstream::api;
use lendstream::app_state::AppState;
use lendstream::config::ServerConfig;
use lendstream::notify::{Broadcaster, BridgeConsumer};
use lendstream::persistence::{NotificationQueue, PostgresStore, SnapshotStore};
use lendstream::shutdown::shutdown_signal;
use lendstream::telemetry::init_tracing;
use lendstream::ws::PushHub;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("loading server configuration")?;
    init_tracing(config.log_format);
    tracing::info!(addr = %config.listen_addr, "starting lendstream");

    let pool = config
        .database
        .connect()
        .await
        .context("connecting to postgres")?;
    let store = Arc::new(PostgresStore::new(pool));
    if config.database.run_migrations {
        store.migrate().await.context("running migrations")?;
    }

    let (hub, hub_handle) = PushHub::new(config.hub.clone());
    let hub_task = hub.spawn();

    let cancel = CancellationToken::new();
    let bridge = BridgeConsumer::new(
        Arc::clone(&store) as Arc<dyn NotificationQueue>,
        Arc::clone(&store) as Arc<dyn SnapshotStore>,
        Arc::new(hub_handle.clone()) as Arc<dyn Broadcaster>,
        config.queue_key.clone(),
        config.notify_poll,
    )
    .start(cancel.clone());

    let app = api::build_app(AppState {
        snapshots: Arc::clone(&store) as Arc<dyn SnapshotStore>,
        hub: hub_handle,
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    cancel.cancel();
    if bridge.await.is_err() {
        tracing::warn!("notification bridge task panicked");
    }
    // Upgraded sockets may still hold handles; stopping the hub closes them.
    hub_task.abort();

    tracing::info!("lendstream stopped");
    Ok(())
}
