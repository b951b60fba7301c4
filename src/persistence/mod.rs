//! Persistence layer: checkpoint, snapshot tables, and the durable queue.
//!
//! The core only ever issues single-statement operations, so each trait
//! method maps to one SQL statement in [`PostgresStore`]. The in-memory
//! implementations in [`memory`] back tests and ephemeral runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::domain::{
    Checkpoint, CollateralSnapshot, LendSnapshot, NewCollateralSnapshot, NewLendSnapshot,
};
use crate::error::AppError;

pub use memory::{MemoryCheckpointStore, MemoryQueue, MemorySnapshotStore};
pub use postgres::PostgresStore;

/// Per-chain checkpoint storage.
#[async_trait]
pub trait CheckpointStore: Send + Sync + std::fmt::Debug {
    /// Loads the checkpoint for `chain_id`, or `None` if it was never seeded.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on store failure.
    async fn load(&self, chain_id: i64) -> Result<Option<Checkpoint>, AppError>;

    /// Overwrites the next block to process for `chain_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on store failure and
    /// [`AppError::CheckpointMissing`] if the row does not exist.
    async fn save_block(&self, chain_id: i64, block: u64) -> Result<(), AppError>;
}

/// Append-only snapshot tables.
#[async_trait]
pub trait SnapshotStore: Send + Sync + std::fmt::Debug {
    /// Appends a lend row and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on store failure.
    async fn insert_lend(&self, row: &NewLendSnapshot) -> Result<i64, AppError>;

    /// Appends a collateral row and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on store failure.
    async fn insert_collateral(&self, row: &NewCollateralSnapshot) -> Result<i64, AppError>;

    /// Most recently inserted lend row for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on store failure.
    async fn latest_lend(&self, kind: i32) -> Result<Option<LendSnapshot>, AppError>;

    /// Most recently inserted collateral row for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] on store failure.
    async fn latest_collateral(&self, kind: i32) -> Result<Option<CollateralSnapshot>, AppError>;
}

/// Durable FIFO keyed by name, carrying opaque tokens.
#[async_trait]
pub trait NotificationQueue: Send + Sync + std::fmt::Debug {
    /// Appends `token` to the tail of queue `key`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Queue`] on store failure.
    async fn push(&self, key: &str, token: &str) -> Result<(), AppError>;

    /// Removes and returns the head of queue `key`; `None` when empty.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Queue`] on store failure.
    async fn pop(&self, key: &str) -> Result<Option<String>, AppError>;
}
