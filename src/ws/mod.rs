//! WebSocket push layer.
//!
//! A single [`PushHub`] task owns every live connection. Each upgraded
//! socket registers through a [`HubHandle`], gets a bounded outbound queue,
//! and is evicted the moment that queue overflows.

pub mod connection;
pub mod handler;
pub mod hub;
pub mod messages;

pub use hub::{ClientLink, ConnectionId, HubHandle, PushHub};
pub use messages::{MessageType, WsMessage};
