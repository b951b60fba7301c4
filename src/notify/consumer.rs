//! Consumer side of the notification bridge.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::Broadcaster;
use crate::domain::LEND_TYPE_USDC;
use crate::error::AppError;
use crate::persistence::{NotificationQueue, SnapshotStore};
use crate::ws::WsMessage;

/// Result of a single poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The queue was empty.
    Idle,
    /// A token was popped and the latest snapshot was broadcast.
    Delivered,
    /// A token was popped but no lend snapshot exists yet.
    NoSnapshot,
    /// A step failed; the error was logged.
    Failed,
}

/// Pops notification tokens and broadcasts the current lend snapshot.
#[derive(Debug, Clone)]
pub struct BridgeConsumer {
    queue: Arc<dyn NotificationQueue>,
    snapshots: Arc<dyn SnapshotStore>,
    broadcaster: Arc<dyn Broadcaster>,
    key: String,
    idle_delay: Duration,
}

impl BridgeConsumer {
    /// Creates a consumer of queue `key` that sleeps `idle_delay` whenever
    /// the queue is empty.
    #[must_use]
    pub fn new(
        queue: Arc<dyn NotificationQueue>,
        snapshots: Arc<dyn SnapshotStore>,
        broadcaster: Arc<dyn Broadcaster>,
        key: impl Into<String>,
        idle_delay: Duration,
    ) -> Self {
        Self {
            queue,
            snapshots,
            broadcaster,
            key: key.into(),
            idle_delay,
        }
    }

    /// Spawns [`Self::run`] on the Tokio runtime.
    pub fn start(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Polls until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(queue = %self.key, "notification bridge started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let outcome = self.poll_once().await;
            if matches!(outcome, PollOutcome::Idle | PollOutcome::Failed) {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(self.idle_delay) => {}
                }
            }
        }
        info!(queue = %self.key, "notification bridge stopped");
    }

    /// Runs a single pop → fetch → broadcast cycle.
    pub async fn poll_once(&self) -> PollOutcome {
        match self.queue.pop(&self.key).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(queue = %self.key, "notification queue empty");
                return PollOutcome::Idle;
            }
            Err(e) => {
                error!(queue = %self.key, error = %e, "failed to pop notification");
                return PollOutcome::Failed;
            }
        }

        match self.deliver_latest().await {
            Ok(true) => PollOutcome::Delivered,
            Ok(false) => {
                debug!("no lend snapshot to broadcast");
                PollOutcome::NoSnapshot
            }
            Err(e) => {
                error!(error = %e, "failed to broadcast lend snapshot");
                PollOutcome::Failed
            }
        }
    }

    async fn deliver_latest(&self) -> Result<bool, AppError> {
        let Some(row) = self.snapshots.latest_lend(LEND_TYPE_USDC).await? else {
            return Ok(false);
        };
        let payload =
            serde_json::to_value(&row).map_err(|e| AppError::Internal(e.to_string()))?;
        let message = WsMessage::broadcast(payload).to_json()?;
        self.broadcaster.broadcast(message).await?;
        Ok(true)
    }
}
