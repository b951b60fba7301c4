//! Lending pool event schemas and typed decoding.

use alloy::primitives::{B256, LogData, U256};
use alloy::sol_types::SolEvent;

use crate::chain::RawLog;

#[allow(missing_docs)]
mod abi {
    use alloy::sol;

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        event DepositLend(address indexed user, address pool, uint256 amount);
        #[derive(Debug, PartialEq, Eq)]
        event DepositLendWithdraw(address indexed pool, address user, uint256 amount);
        #[derive(Debug, PartialEq, Eq)]
        event DepositBorrow(address indexed user, address indexed tokenAddress, uint256 amount);
        #[derive(Debug, PartialEq, Eq)]
        event DepositBorrowWithdraw(
            address indexed user,
            address indexed tokenAddress,
            uint256 amount
        );
        #[derive(Debug, PartialEq, Eq)]
        event Liquidate(
            address indexed liquidator,
            address indexed liquidated,
            address indexed tokenAddress,
            uint256 usdcAmount
        );
        #[derive(Debug, PartialEq, Eq)]
        event CalculateBorrowable(address indexed collateralAddress, uint256 borrowable);
        #[derive(Debug, PartialEq, Eq)]
        event StatusChanged(
            uint256 utilizationRate,
            uint256 totalBorrow,
            uint256 totalDeposits,
            uint256 interestRate
        );
        #[derive(Debug, PartialEq, Eq)]
        event CollateralChanged(
            address indexed tokenAddress,
            uint256 utilizationRate,
            uint256 borrowed,
            uint256 borrowable,
            uint256 interestRate,
            uint256 healthFactor,
            uint256 liquidationThreshold,
            uint256 collateralizationRatio
        );
    }
}

pub use abi::{
    CalculateBorrowable, CollateralChanged, DepositBorrow, DepositBorrowWithdraw, DepositLend,
    DepositLendWithdraw, Liquidate, StatusChanged,
};

/// Per-event decode and validation failures.
///
/// Every variant drops exactly one event; none aborts the range being
/// processed.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The log carries fewer topics than the schema's indexed fields need.
    #[error("{event}: expected at least {expected} topics, got {actual}")]
    InsufficientTopics {
        /// Event name.
        event: &'static str,
        /// Topics required by the schema (signature included).
        expected: usize,
        /// Topics present on the log.
        actual: usize,
    },

    /// The data payload does not match the schema.
    #[error("{event}: malformed payload: {source}")]
    MalformedPayload {
        /// Event name.
        event: &'static str,
        /// Underlying ABI decoding error.
        source: alloy::sol_types::Error,
    },

    /// An amount that must be positive decoded as zero.
    #[error("{event}: {field} must be positive")]
    NonPositiveAmount {
        /// Event name.
        event: &'static str,
        /// Offending field.
        field: &'static str,
    },

    /// A rate field does not fit the integer column.
    #[error("{event}: {field} does not fit a signed 64-bit integer")]
    ValueOutOfRange {
        /// Event name.
        event: &'static str,
        /// Offending field.
        field: &'static str,
    },
}

/// Closed set of event kinds emitted by the lending pool contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Lender deposit.
    DepositLend,
    /// Lender withdrawal.
    DepositLendWithdraw,
    /// Collateral deposit.
    DepositBorrow,
    /// Collateral withdrawal.
    DepositBorrowWithdraw,
    /// Position liquidation.
    Liquidate,
    /// Borrowable amount recomputed.
    CalculateBorrowable,
    /// Lend market state changed.
    StatusChanged,
    /// Collateral market state changed.
    CollateralChanged,
}

impl EventKind {
    /// Every known kind.
    pub const ALL: [Self; 8] = [
        Self::DepositLend,
        Self::DepositLendWithdraw,
        Self::DepositBorrow,
        Self::DepositBorrowWithdraw,
        Self::Liquidate,
        Self::CalculateBorrowable,
        Self::StatusChanged,
        Self::CollateralChanged,
    ];

    /// Classifies a signature topic; `None` for events this contract does
    /// not emit.
    #[must_use]
    pub fn from_signature(topic: &B256) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.signature() == *topic)
    }

    /// Keccak-256 hash of the event signature (`topics[0]`).
    #[must_use]
    pub const fn signature(self) -> B256 {
        match self {
            Self::DepositLend => DepositLend::SIGNATURE_HASH,
            Self::DepositLendWithdraw => DepositLendWithdraw::SIGNATURE_HASH,
            Self::DepositBorrow => DepositBorrow::SIGNATURE_HASH,
            Self::DepositBorrowWithdraw => DepositBorrowWithdraw::SIGNATURE_HASH,
            Self::Liquidate => Liquidate::SIGNATURE_HASH,
            Self::CalculateBorrowable => CalculateBorrowable::SIGNATURE_HASH,
            Self::StatusChanged => StatusChanged::SIGNATURE_HASH,
            Self::CollateralChanged => CollateralChanged::SIGNATURE_HASH,
        }
    }

    /// Event name as declared in the contract.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DepositLend => "DepositLend",
            Self::DepositLendWithdraw => "DepositLendWithdraw",
            Self::DepositBorrow => "DepositBorrow",
            Self::DepositBorrowWithdraw => "DepositBorrowWithdraw",
            Self::Liquidate => "Liquidate",
            Self::CalculateBorrowable => "CalculateBorrowable",
            Self::StatusChanged => "StatusChanged",
            Self::CollateralChanged => "CollateralChanged",
        }
    }

    /// Signature topic plus one topic per indexed field.
    #[must_use]
    pub const fn required_topics(self) -> usize {
        match self {
            Self::StatusChanged => 1,
            Self::DepositLend
            | Self::DepositLendWithdraw
            | Self::CalculateBorrowable
            | Self::CollateralChanged => 2,
            Self::DepositBorrow | Self::DepositBorrowWithdraw => 3,
            Self::Liquidate => 4,
        }
    }

    /// Decodes `log` as this kind.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InsufficientTopics`] or
    /// [`DecodeError::MalformedPayload`].
    pub fn decode(self, log: &RawLog) -> Result<LendingEvent, DecodeError> {
        let expected = self.required_topics();
        if log.topics.len() < expected {
            return Err(DecodeError::InsufficientTopics {
                event: self.name(),
                expected,
                actual: log.topics.len(),
            });
        }

        let data = LogData::new_unchecked(log.topics.clone(), log.data.clone());
        let event = match self {
            Self::DepositLend => LendingEvent::DepositLend(decode_as(self, &data)?),
            Self::DepositLendWithdraw => LendingEvent::DepositLendWithdraw(decode_as(self, &data)?),
            Self::DepositBorrow => LendingEvent::DepositBorrow(decode_as(self, &data)?),
            Self::DepositBorrowWithdraw => {
                LendingEvent::DepositBorrowWithdraw(decode_as(self, &data)?)
            }
            Self::Liquidate => LendingEvent::Liquidate(decode_as(self, &data)?),
            Self::CalculateBorrowable => LendingEvent::CalculateBorrowable(decode_as(self, &data)?),
            Self::StatusChanged => LendingEvent::StatusChanged(decode_as(self, &data)?),
            Self::CollateralChanged => LendingEvent::CollateralChanged(decode_as(self, &data)?),
        };
        Ok(event)
    }
}

fn decode_as<E: SolEvent>(kind: EventKind, data: &LogData) -> Result<E, DecodeError> {
    E::decode_log_data(data).map_err(|source| DecodeError::MalformedPayload {
        event: kind.name(),
        source,
    })
}

/// A decoded lending pool event.
#[derive(Debug, Clone)]
pub enum LendingEvent {
    /// See [`DepositLend`].
    DepositLend(DepositLend),
    /// See [`DepositLendWithdraw`].
    DepositLendWithdraw(DepositLendWithdraw),
    /// See [`DepositBorrow`].
    DepositBorrow(DepositBorrow),
    /// See [`DepositBorrowWithdraw`].
    DepositBorrowWithdraw(DepositBorrowWithdraw),
    /// See [`Liquidate`].
    Liquidate(Liquidate),
    /// See [`CalculateBorrowable`].
    CalculateBorrowable(CalculateBorrowable),
    /// See [`StatusChanged`].
    StatusChanged(StatusChanged),
    /// See [`CollateralChanged`].
    CollateralChanged(CollateralChanged),
}

impl LendingEvent {
    /// The kind this event was decoded as.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::DepositLend(_) => EventKind::DepositLend,
            Self::DepositLendWithdraw(_) => EventKind::DepositLendWithdraw,
            Self::DepositBorrow(_) => EventKind::DepositBorrow,
            Self::DepositBorrowWithdraw(_) => EventKind::DepositBorrowWithdraw,
            Self::Liquidate(_) => EventKind::Liquidate,
            Self::CalculateBorrowable(_) => EventKind::CalculateBorrowable,
            Self::StatusChanged(_) => EventKind::StatusChanged,
            Self::CollateralChanged(_) => EventKind::CollateralChanged,
        }
    }
}

/// Converts a `uint256` rate into the integer column type.
///
/// # Errors
///
/// Returns [`DecodeError::ValueOutOfRange`] above `i64::MAX`.
pub fn rate_to_i64(
    kind: EventKind,
    field: &'static str,
    value: U256,
) -> Result<i64, DecodeError> {
    let out_of_range = || DecodeError::ValueOutOfRange {
        event: kind.name(),
        field,
    };
    if value > U256::from(u64::MAX >> 1) {
        return Err(out_of_range());
    }
    i64::try_from(value.to::<u64>()).map_err(|_| out_of_range())
}
