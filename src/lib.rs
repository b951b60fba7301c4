//! # lendstream
//!
//! Chain-log indexer for a lending pool contract, with a WebSocket push
//! gateway for the resulting market snapshots.
//!
//! Two processes share a PostgreSQL database:
//!
//! ```text
//! indexer (bin/indexer.rs)                 lendstream (main.rs)
//!   IndexerLoop (indexer/)                   HTTP read API (api/)
//!     ChainClient (chain/)                   PushHub (ws/)
//!     EventProcessor (decoder/)    ──▶         ▲
//!       SnapshotStore (persistence/)           │
//!     Notifier (notify/) ──▶ notify_queue ──▶ BridgeConsumer (notify/)
//! ```
//!
//! The indexer walks block windows from a persisted checkpoint, decodes the
//! contract's events into append-only lend and collateral snapshot rows, and
//! pushes one notification token per log. The server pops those tokens,
//! re-reads the newest lend snapshot and fans it out to every connected
//! WebSocket client.

pub mod api;
pub mod app_state;
pub mod chain;
pub mod config;
pub mod decoder;
pub mod domain;
pub mod error;
pub mod indexer;
pub mod notify;
pub mod persistence;
pub mod shutdown;
pub mod telemetry;
pub mod ws;
