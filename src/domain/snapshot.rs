//! Append-only snapshot rows for the lend market and collateral tokens.
//!
//! Monetary amounts are kept as decimal strings so that full `uint256`
//! precision survives the round trip through SQL and JSON. Rates are
//! integers with two implied decimal places (`1002` = 10.02%).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Type discriminant of the single lend market (USDC).
pub const LEND_TYPE_USDC: i32 = 0;

/// Creator/updater identity stamped on every row the indexer writes.
pub const SYSTEM_IDENTITY: &str = "system";

/// A persisted row of the `lend` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LendSnapshot {
    /// Auto-increment row ID.
    pub id: i64,
    /// Market discriminant; `0` is USDC.
    #[serde(rename = "type")]
    pub kind: i32,
    /// Total borrowed amount (decimal string).
    pub total_borrow: String,
    /// Total deposited amount (decimal string).
    pub total_deposits: String,
    /// Utilization rate, two implied decimals.
    pub utilization_rate: i64,
    /// Interest rate, two implied decimals.
    pub interest_rate: i64,
    /// Unix seconds at insert.
    pub create_time: i64,
    /// Unix seconds at insert.
    pub update_time: i64,
    /// Writer identity.
    pub creator: String,
    /// Writer identity.
    pub updater: String,
}

/// Insert payload for the `lend` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLendSnapshot {
    /// Market discriminant.
    pub kind: i32,
    /// Total borrowed amount (decimal string).
    pub total_borrow: String,
    /// Total deposited amount (decimal string).
    pub total_deposits: String,
    /// Utilization rate, two implied decimals.
    pub utilization_rate: i64,
    /// Interest rate, two implied decimals.
    pub interest_rate: i64,
    /// Unix seconds used for both create and update time.
    pub stamped_at: i64,
    /// Writer identity used for both creator and updater.
    pub identity: String,
}

impl NewLendSnapshot {
    /// Materializes the row as the store would return it under `id`.
    #[must_use]
    pub fn into_row(self, id: i64) -> LendSnapshot {
        LendSnapshot {
            id,
            kind: self.kind,
            total_borrow: self.total_borrow,
            total_deposits: self.total_deposits,
            utilization_rate: self.utilization_rate,
            interest_rate: self.interest_rate,
            create_time: self.stamped_at,
            update_time: self.stamped_at,
            creator: self.identity.clone(),
            updater: self.identity,
        }
    }
}

/// A persisted row of the `collateral` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CollateralSnapshot {
    /// Auto-increment row ID.
    pub id: i64,
    /// Collateral token contract address (checksummed hex).
    pub token_address: String,
    /// Collateral type resolved from the token map; `0` when unknown.
    #[serde(rename = "type")]
    pub kind: i32,
    /// Borrowed amount (decimal string).
    pub borrowed: String,
    /// Borrowable amount (decimal string).
    pub borrowable: String,
    /// Utilization rate, two implied decimals.
    pub utilization_rate: i64,
    /// Interest rate, two implied decimals.
    pub interest_rate: i64,
    /// Health factor, two implied decimals.
    pub health_factor: i64,
    /// Liquidation threshold, two implied decimals.
    pub liquidation_threshold: i64,
    /// Collateralization rate, two implied decimals.
    pub collateralization_rate: i64,
    /// Unix seconds at insert.
    pub create_time: i64,
    /// Unix seconds at insert.
    pub update_time: i64,
    /// Writer identity.
    pub creator: String,
    /// Writer identity.
    pub updater: String,
}

/// Insert payload for the `collateral` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollateralSnapshot {
    /// Collateral token contract address (checksummed hex).
    pub token_address: String,
    /// Collateral type discriminant.
    pub kind: i32,
    /// Borrowed amount (decimal string).
    pub borrowed: String,
    /// Borrowable amount (decimal string).
    pub borrowable: String,
    /// Utilization rate.
    pub utilization_rate: i64,
    /// Interest rate.
    pub interest_rate: i64,
    /// Health factor.
    pub health_factor: i64,
    /// Liquidation threshold.
    pub liquidation_threshold: i64,
    /// Collateralization rate.
    pub collateralization_rate: i64,
    /// Unix seconds used for both create and update time.
    pub stamped_at: i64,
    /// Writer identity used for both creator and updater.
    pub identity: String,
}

impl NewCollateralSnapshot {
    /// Materializes the row as the store would return it under `id`.
    #[must_use]
    pub fn into_row(self, id: i64) -> CollateralSnapshot {
        CollateralSnapshot {
            id,
            token_address: self.token_address,
            kind: self.kind,
            borrowed: self.borrowed,
            borrowable: self.borrowable,
            utilization_rate: self.utilization_rate,
            interest_rate: self.interest_rate,
            health_factor: self.health_factor,
            liquidation_threshold: self.liquidation_threshold,
            collateralization_rate: self.collateralization_rate,
            create_time: self.stamped_at,
            update_time: self.stamped_at,
            creator: self.identity.clone(),
            updater: self.identity,
        }
    }
}
