//! Turns classified logs into snapshot inserts.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tracing::{debug, error, warn};

use super::events::{
    CollateralChanged, DecodeError, DepositLend, EventKind, LendingEvent, StatusChanged,
    rate_to_i64,
};
use crate::chain::RawLog;
use crate::domain::{
    LEND_TYPE_USDC, NewCollateralSnapshot, NewLendSnapshot, SYSTEM_IDENTITY, TokenTypeMap,
};
use crate::persistence::SnapshotStore;

/// What happened to a single log.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// A snapshot row was appended under `row_id`.
    Persisted {
        /// Event kind.
        kind: EventKind,
        /// ID assigned by the store.
        row_id: i64,
    },
    /// The event decoded and validated but has no write attached.
    Ignored(EventKind),
    /// The event was dropped by decoding or validation.
    Rejected(DecodeError),
    /// The row was built but the store refused it.
    WriteFailed(EventKind),
    /// `topics[0]` names no event this contract emits.
    Unrecognized,
}

impl ProcessOutcome {
    /// Whether a row was appended.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted { .. })
    }
}

enum SnapshotWrite {
    Lend(NewLendSnapshot),
    Collateral(NewCollateralSnapshot),
}

/// Decodes, validates and persists one log at a time.
#[derive(Debug, Clone)]
pub struct EventProcessor {
    snapshots: Arc<dyn SnapshotStore>,
    token_types: Arc<TokenTypeMap>,
}

impl EventProcessor {
    /// Creates a processor writing to `snapshots`.
    #[must_use]
    pub fn new(snapshots: Arc<dyn SnapshotStore>, token_types: TokenTypeMap) -> Self {
        Self {
            snapshots,
            token_types: Arc::new(token_types),
        }
    }

    /// Handles one log. Never fails: every problem is logged and reported
    /// through the returned [`ProcessOutcome`].
    pub async fn process(&self, log: &RawLog) -> ProcessOutcome {
        let Some(kind) = log.signature().and_then(EventKind::from_signature) else {
            debug!(
                tx_hash = %log.tx_hash,
                block_number = log.block_number,
                log_index = log.log_index,
                "log with unrecognized signature"
            );
            return ProcessOutcome::Unrecognized;
        };

        let write = match kind
            .decode(log)
            .and_then(|event| self.plan_write(log, event, chrono::Utc::now().timestamp()))
        {
            Ok(Some(write)) => write,
            Ok(None) => return ProcessOutcome::Ignored(kind),
            Err(reason) => {
                report_rejection(log, &reason);
                return ProcessOutcome::Rejected(reason);
            }
        };

        let result = match &write {
            SnapshotWrite::Lend(row) => self.snapshots.insert_lend(row).await,
            SnapshotWrite::Collateral(row) => self.snapshots.insert_collateral(row).await,
        };
        match result {
            Ok(row_id) => {
                debug!(event = kind.name(), row_id, tx_hash = %log.tx_hash, "snapshot appended");
                ProcessOutcome::Persisted { kind, row_id }
            }
            Err(e) => {
                error!(
                    event = kind.name(),
                    tx_hash = %log.tx_hash,
                    block_number = log.block_number,
                    error = %e,
                    "snapshot insert failed"
                );
                ProcessOutcome::WriteFailed(kind)
            }
        }
    }

    fn plan_write(
        &self,
        log: &RawLog,
        event: LendingEvent,
        now: i64,
    ) -> Result<Option<SnapshotWrite>, DecodeError> {
        match event {
            LendingEvent::DepositLend(event) => {
                validate_deposit_lend(log, &event)?;
                Ok(None)
            }
            LendingEvent::StatusChanged(event) => {
                Ok(Some(SnapshotWrite::Lend(lend_row(&event, now)?)))
            }
            LendingEvent::CollateralChanged(event) => {
                warn_if_zero(log, EventKind::CollateralChanged, "tokenAddress", event.tokenAddress);
                let kind = self.token_types.resolve(&event.tokenAddress);
                Ok(Some(SnapshotWrite::Collateral(collateral_row(
                    &event, kind, now,
                )?)))
            }
            LendingEvent::DepositLendWithdraw(_)
            | LendingEvent::DepositBorrow(_)
            | LendingEvent::DepositBorrowWithdraw(_)
            | LendingEvent::Liquidate(_)
            | LendingEvent::CalculateBorrowable(_) => Ok(None),
        }
    }
}

fn validate_deposit_lend(log: &RawLog, event: &DepositLend) -> Result<(), DecodeError> {
    warn_if_zero(log, EventKind::DepositLend, "pool", event.pool);
    if event.amount == U256::ZERO {
        return Err(DecodeError::NonPositiveAmount {
            event: EventKind::DepositLend.name(),
            field: "amount",
        });
    }
    Ok(())
}

fn lend_row(event: &StatusChanged, now: i64) -> Result<NewLendSnapshot, DecodeError> {
    let kind = EventKind::StatusChanged;
    Ok(NewLendSnapshot {
        kind: LEND_TYPE_USDC,
        total_borrow: event.totalBorrow.to_string(),
        total_deposits: event.totalDeposits.to_string(),
        utilization_rate: rate_to_i64(kind, "utilizationRate", event.utilizationRate)?,
        interest_rate: rate_to_i64(kind, "interestRate", event.interestRate)?,
        stamped_at: now,
        identity: SYSTEM_IDENTITY.to_string(),
    })
}

fn collateral_row(
    event: &CollateralChanged,
    token_type: i32,
    now: i64,
) -> Result<NewCollateralSnapshot, DecodeError> {
    let kind = EventKind::CollateralChanged;
    Ok(NewCollateralSnapshot {
        token_address: event.tokenAddress.to_checksum(None),
        kind: token_type,
        borrowed: event.borrowed.to_string(),
        borrowable: event.borrowable.to_string(),
        utilization_rate: rate_to_i64(kind, "utilizationRate", event.utilizationRate)?,
        interest_rate: rate_to_i64(kind, "interestRate", event.interestRate)?,
        health_factor: rate_to_i64(kind, "healthFactor", event.healthFactor)?,
        liquidation_threshold: rate_to_i64(
            kind,
            "liquidationThreshold",
            event.liquidationThreshold,
        )?,
        collateralization_rate: rate_to_i64(
            kind,
            "collateralizationRatio",
            event.collateralizationRatio,
        )?,
        stamped_at: now,
        identity: SYSTEM_IDENTITY.to_string(),
    })
}

fn warn_if_zero(log: &RawLog, kind: EventKind, field: &'static str, value: Address) {
    if value == Address::ZERO {
        warn!(
            event = kind.name(),
            field,
            tx_hash = %log.tx_hash,
            block_number = log.block_number,
            "zero address in event field"
        );
    }
}

fn report_rejection(log: &RawLog, reason: &DecodeError) {
    match reason {
        DecodeError::NonPositiveAmount { .. } | DecodeError::ValueOutOfRange { .. } => warn!(
            tx_hash = %log.tx_hash,
            block_number = log.block_number,
            log_index = log.log_index,
            reason = %reason,
            "event dropped by validation"
        ),
        DecodeError::InsufficientTopics { .. } | DecodeError::MalformedPayload { .. } => error!(
            tx_hash = %log.tx_hash,
            block_number = log.block_number,
            log_index = log.log_index,
            payload = %log.data,
            reason = %reason,
            "event could not be decoded"
        ),
    }
}
