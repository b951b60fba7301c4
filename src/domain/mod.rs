//! Domain layer: checkpoint, snapshot rows, and collateral token typing.
//!
//! Rows here are what the indexer writes and the read path serves. Snapshot
//! tables are append-only; the "current" value of a discriminant is always
//! the most recently inserted row.

pub mod checkpoint;
pub mod snapshot;
pub mod token_map;

pub use checkpoint::Checkpoint;
pub use snapshot::{
    CollateralSnapshot, LEND_TYPE_USDC, LendSnapshot, NewCollateralSnapshot, NewLendSnapshot,
    SYSTEM_IDENTITY,
};
pub use token_map::TokenTypeMap;
