//! WebSocket message envelope shared by inbound and outbound traffic.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Payload of the reply to a client `ping`.
pub const PONG_PAYLOAD: &str = "pong_response";

/// Prefix of the heartbeat payload; followed by unix seconds.
pub const HEARTBEAT_PREFIX: &str = "server_ok_";

/// Outbound message types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Client liveness probe.
    Ping,
    /// Reply to [`MessageType::Ping`].
    Pong,
    /// Client subscription request.
    Subscribe,
    /// Acknowledgement echoing the subscribe payload.
    Subscribed,
    /// Periodic server liveness message.
    Heartbeat,
    /// Fan-out of the latest lend snapshot.
    Broadcast,
}

/// Message envelope: `{"type", "payload", "timestamp"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WsMessage {
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Type-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Unix seconds at creation.
    pub timestamp: i64,
}

impl WsMessage {
    /// Builds a message stamped with the current time.
    #[must_use]
    pub fn new(kind: MessageType, payload: serde_json::Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// `heartbeat` carrying `server_ok_<now>`.
    #[must_use]
    pub fn heartbeat() -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            kind: MessageType::Heartbeat,
            payload: serde_json::Value::String(format!("{HEARTBEAT_PREFIX}{now}")),
            timestamp: now,
        }
    }

    /// `pong` reply.
    #[must_use]
    pub fn pong() -> Self {
        Self::new(MessageType::Pong, PONG_PAYLOAD.into())
    }

    /// `subscribed` acknowledgement echoing `payload`.
    #[must_use]
    pub fn subscribed(payload: serde_json::Value) -> Self {
        Self::new(MessageType::Subscribed, payload)
    }

    /// `broadcast` wrapper around a snapshot.
    #[must_use]
    pub fn broadcast(payload: serde_json::Value) -> Self {
        Self::new(MessageType::Broadcast, payload)
    }

    /// Serializes to the wire form.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if serialization fails.
    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string(self).map_err(|e| AppError::Internal(e.to_string()))
    }
}

/// A client message. The type stays a free-form string so unknown types can
/// be logged instead of failing to parse.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    /// Client-declared type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Computes the direct reply to a client text frame, if any.
///
/// `ping` gets a `pong`, `subscribe` gets a `subscribed` echo. Unknown types
/// and unparsable frames are logged and produce nothing.
#[must_use]
pub fn reply_to(text: &str) -> Option<WsMessage> {
    let message = match serde_json::from_str::<InboundMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "unparsable client message");
            return None;
        }
    };

    match message.kind.as_str() {
        "ping" => Some(WsMessage::pong()),
        "subscribe" => Some(WsMessage::subscribed(message.payload)),
        other => {
            tracing::debug!(
                kind = other,
                payload = %message.payload,
                "unknown client message type"
            );
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ping_gets_pong() {
        let Some(reply) = reply_to(r#"{"type":"ping"}"#) else {
            panic!("ping should be answered");
        };
        assert_eq!(reply.kind, MessageType::Pong);
        assert_eq!(reply.payload, json!("pong_response"));
    }

    #[test]
    fn subscribe_echoes_payload() {
        let Some(reply) = reply_to(r#"{"type":"subscribe","payload":{"channel":"lend"}}"#) else {
            panic!("subscribe should be acknowledged");
        };
        assert_eq!(reply.kind, MessageType::Subscribed);
        assert_eq!(reply.payload, json!({"channel": "lend"}));
    }

    #[test]
    fn unknown_and_garbage_are_silent() {
        assert!(reply_to(r#"{"type":"hello","payload":1}"#).is_none());
        assert!(reply_to("not json").is_none());
    }

    #[test]
    fn wire_shape_uses_lowercase_type() {
        let Ok(text) = WsMessage::heartbeat().to_json() else {
            panic!("heartbeat should serialize");
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
            panic!("heartbeat should be JSON");
        };
        assert_eq!(value.get("type"), Some(&json!("heartbeat")));
        let payload = value.get("payload").and_then(serde_json::Value::as_str);
        assert!(payload.is_some_and(|p| p.starts_with(HEARTBEAT_PREFIX)));
        assert!(value.get("timestamp").is_some_and(serde_json::Value::is_i64));
    }
}
