//! PostgreSQL implementation of the persistence layer.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::{CheckpointStore, NotificationQueue, SnapshotStore};
use crate::domain::{
    Checkpoint, CollateralSnapshot, LendSnapshot, NewCollateralSnapshot, NewLendSnapshot,
};
use crate::error::AppError;

type LendRow = (i64, i32, String, String, i64, i64, i64, i64, String, String);

type CollateralRow = (
    i64,
    String,
    i32,
    String,
    String,
    i64,
    i64,
    i64,
    i64,
    i64,
    i64,
    i64,
    String,
    String,
);

/// PostgreSQL-backed store using `sqlx::PgPool`.
///
/// Implements every persistence trait; the indexer and the push server
/// each hold their own instance over their own pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }
}

#[async_trait]
impl CheckpointStore for PostgresStore {
    async fn load(&self, chain_id: i64) -> Result<Option<Checkpoint>, AppError> {
        let row = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT chain_id, last_indexed_block, last_indexed_time \
             FROM indexed_status WHERE chain_id = $1",
        )
        .bind(chain_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(chain_id, block, time)| {
            let block = u64::try_from(block).map_err(|_| {
                AppError::Persistence(format!("negative checkpoint block {block}"))
            })?;
            Ok(Checkpoint::new(chain_id, block, time))
        })
        .transpose()
    }

    async fn save_block(&self, chain_id: i64, block: u64) -> Result<(), AppError> {
        let block = i64::try_from(block)
            .map_err(|_| AppError::Persistence(format!("block {block} exceeds BIGINT")))?;

        let result = sqlx::query(
            "UPDATE indexed_status SET last_indexed_block = $2, update_time = $3 \
             WHERE chain_id = $1",
        )
        .bind(chain_id)
        .bind(block)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::CheckpointMissing(chain_id));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for PostgresStore {
    async fn insert_lend(&self, row: &NewLendSnapshot) -> Result<i64, AppError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO lend (type, total_borrow, total_deposits, utilization_rate, \
             interest_rate, create_time, update_time, creator, updater) \
             VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $7) RETURNING id",
        )
        .bind(row.kind)
        .bind(&row.total_borrow)
        .bind(&row.total_deposits)
        .bind(row.utilization_rate)
        .bind(row.interest_rate)
        .bind(row.stamped_at)
        .bind(&row.identity)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_collateral(&self, row: &NewCollateralSnapshot) -> Result<i64, AppError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO collateral (token_address, type, borrowed, borrowable, \
             utilization_rate, interest_rate, health_factor, liquidation_threshold, \
             collateralization_rate, create_time, update_time, creator, updater) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10, $11, $11) RETURNING id",
        )
        .bind(&row.token_address)
        .bind(row.kind)
        .bind(&row.borrowed)
        .bind(&row.borrowable)
        .bind(row.utilization_rate)
        .bind(row.interest_rate)
        .bind(row.health_factor)
        .bind(row.liquidation_threshold)
        .bind(row.collateralization_rate)
        .bind(row.stamped_at)
        .bind(&row.identity)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn latest_lend(&self, kind: i32) -> Result<Option<LendSnapshot>, AppError> {
        let row = sqlx::query_as::<_, LendRow>(
            "SELECT id, type, total_borrow, total_deposits, utilization_rate, interest_rate, \
             create_time, update_time, creator, updater \
             FROM lend WHERE type = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(
                id,
                kind,
                total_borrow,
                total_deposits,
                utilization_rate,
                interest_rate,
                create_time,
                update_time,
                creator,
                updater,
            )| LendSnapshot {
                id,
                kind,
                total_borrow,
                total_deposits,
                utilization_rate,
                interest_rate,
                create_time,
                update_time,
                creator,
                updater,
            },
        ))
    }

    async fn latest_collateral(&self, kind: i32) -> Result<Option<CollateralSnapshot>, AppError> {
        let row = sqlx::query_as::<_, CollateralRow>(
            "SELECT id, token_address, type, borrowed, borrowable, utilization_rate, \
             interest_rate, health_factor, liquidation_threshold, collateralization_rate, \
             create_time, update_time, creator, updater \
             FROM collateral WHERE type = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(
                id,
                token_address,
                kind,
                borrowed,
                borrowable,
                utilization_rate,
                interest_rate,
                health_factor,
                liquidation_threshold,
                collateralization_rate,
                create_time,
                update_time,
                creator,
                updater,
            )| CollateralSnapshot {
                id,
                token_address,
                kind,
                borrowed,
                borrowable,
                utilization_rate,
                interest_rate,
                health_factor,
                liquidation_threshold,
                collateralization_rate,
                create_time,
                update_time,
                creator,
                updater,
            },
        ))
    }
}

#[async_trait]
impl NotificationQueue for PostgresStore {
    async fn push(&self, key: &str, token: &str) -> Result<(), AppError> {
        sqlx::query("INSERT INTO notify_queue (queue_key, token) VALUES ($1, $2)")
            .bind(key)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Queue(e.to_string()))?;
        Ok(())
    }

    async fn pop(&self, key: &str) -> Result<Option<String>, AppError> {
        sqlx::query_scalar::<_, String>(
            "DELETE FROM notify_queue WHERE id = ( \
                 SELECT id FROM notify_queue WHERE queue_key = $1 \
                 ORDER BY id LIMIT 1 FOR UPDATE SKIP LOCKED \
             ) RETURNING token",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Queue(e.to_string()))
    }
}
