//! In-memory stores for tests and ephemeral runs.
//!
//! Each store guards its state with a `std::sync::Mutex`; no lock is held
//! across an `.await`.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use super::{CheckpointStore, NotificationQueue, SnapshotStore};
use crate::domain::{
    Checkpoint, CollateralSnapshot, LendSnapshot, NewCollateralSnapshot, NewLendSnapshot,
};
use crate::error::AppError;

fn poisoned() -> AppError {
    AppError::Internal("memory store lock poisoned".to_string())
}

/// In-memory checkpoint table.
///
/// `fail_next_writes` lets tests simulate a store outage for a fixed number
/// of `save_block` calls.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    rows: Mutex<HashMap<i64, Checkpoint>>,
    failing_writes: AtomicU32,
}

impl MemoryCheckpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `checkpoint`.
    #[must_use]
    pub fn seeded(checkpoint: Checkpoint) -> Self {
        let store = Self::new();
        if let Ok(mut rows) = store.rows.lock() {
            rows.insert(checkpoint.chain_id, checkpoint);
        }
        store
    }

    /// Makes the next `count` writes fail with a persistence error.
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Current checkpoint for `chain_id`.
    #[must_use]
    pub fn get(&self, chain_id: i64) -> Option<Checkpoint> {
        self.rows
            .lock()
            .ok()
            .and_then(|rows| rows.get(&chain_id).copied())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, chain_id: i64) -> Result<Option<Checkpoint>, AppError> {
        let rows = self.rows.lock().map_err(|_| poisoned())?;
        Ok(rows.get(&chain_id).copied())
    }

    async fn save_block(&self, chain_id: i64, block: u64) -> Result<(), AppError> {
        let failing = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(AppError::Persistence("simulated checkpoint outage".to_string()));
        }

        let mut rows = self.rows.lock().map_err(|_| poisoned())?;
        let row = rows
            .get_mut(&chain_id)
            .ok_or(AppError::CheckpointMissing(chain_id))?;
        row.last_indexed_block = block;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SnapshotTables {
    lend: Vec<LendSnapshot>,
    collateral: Vec<CollateralSnapshot>,
}

/// In-memory append-only snapshot tables.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    tables: Mutex<SnapshotTables>,
}

impl MemorySnapshotStore {
    /// Creates empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All lend rows in insertion order.
    #[must_use]
    pub fn lend_rows(&self) -> Vec<LendSnapshot> {
        self.tables
            .lock()
            .map(|t| t.lend.clone())
            .unwrap_or_default()
    }

    /// All collateral rows in insertion order.
    #[must_use]
    pub fn collateral_rows(&self) -> Vec<CollateralSnapshot> {
        self.tables
            .lock()
            .map(|t| t.collateral.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn insert_lend(&self, row: &NewLendSnapshot) -> Result<i64, AppError> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        let id = i64::try_from(tables.lend.len())
            .map_err(|e| AppError::Internal(e.to_string()))?
            .saturating_add(1);
        tables.lend.push(row.clone().into_row(id));
        Ok(id)
    }

    async fn insert_collateral(&self, row: &NewCollateralSnapshot) -> Result<i64, AppError> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        let id = i64::try_from(tables.collateral.len())
            .map_err(|e| AppError::Internal(e.to_string()))?
            .saturating_add(1);
        tables.collateral.push(row.clone().into_row(id));
        Ok(id)
    }

    async fn latest_lend(&self, kind: i32) -> Result<Option<LendSnapshot>, AppError> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        Ok(tables.lend.iter().rev().find(|r| r.kind == kind).cloned())
    }

    async fn latest_collateral(&self, kind: i32) -> Result<Option<CollateralSnapshot>, AppError> {
        let tables = self.tables.lock().map_err(|_| poisoned())?;
        Ok(tables
            .collateral
            .iter()
            .rev()
            .find(|r| r.kind == kind)
            .cloned())
    }
}

/// In-memory FIFO queues keyed by name.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
}

impl MemoryQueue {
    /// Creates an empty queue set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens waiting in queue `key`.
    #[must_use]
    pub fn len(&self, key: &str) -> usize {
        self.queues
            .lock()
            .ok()
            .and_then(|q| q.get(key).map(VecDeque::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl NotificationQueue for MemoryQueue {
    async fn push(&self, key: &str, token: &str) -> Result<(), AppError> {
        let mut queues = self.queues.lock().map_err(|_| poisoned())?;
        queues
            .entry(key.to_string())
            .or_default()
            .push_back(token.to_string());
        Ok(())
    }

    async fn pop(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut queues = self.queues.lock().map_err(|_| poisoned())?;
        Ok(queues.get_mut(key).and_then(VecDeque::pop_front))
    }
}
