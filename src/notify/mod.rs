//! Notification bridge between the indexer and the push hub.
//!
//! The producer appends an opaque token to a durable FIFO after each log.
//! The consumer pops tokens, re-reads the latest lend snapshot, and hands it
//! to a [`Broadcaster`]. Tokens carry no state; the snapshot store is the
//! source of truth.

pub mod consumer;
pub mod producer;

use async_trait::async_trait;

use crate::error::AppError;

pub use consumer::{BridgeConsumer, PollOutcome};
pub use producer::Notifier;

/// Default queue name shared by both processes.
pub const DEFAULT_QUEUE_KEY: &str = "lend:event:state_changed";

/// Token pushed once per processed log.
pub const NOTIFY_TOKEN: &str = "1";

/// Sink for serialized messages fanned out to live clients.
#[async_trait]
pub trait Broadcaster: Send + Sync + std::fmt::Debug {
    /// Queues `message` for every live connection.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Queue`] when the hub is no longer running.
    async fn broadcast(&self, message: String) -> Result<(), AppError>;
}
