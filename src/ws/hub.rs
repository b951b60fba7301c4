//! Push hub coordinator.
//!
//! [`PushHub`] is the only owner of the live connection set. Connections,
//! the notification bridge and HTTP handlers talk to it exclusively through
//! a cloneable [`HubHandle`]. Register, unregister, broadcast and heartbeat
//! ticks are handled one at a time by a single task.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::messages::WsMessage;
use crate::config::HubConfig;
use crate::error::AppError;
use crate::notify::Broadcaster;

const CONTROL_CAPACITY: usize = 64;

/// Unique identifier of a live WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct Registration {
    id: ConnectionId,
    outbound: mpsc::Sender<String>,
}

/// What a connection gets back from [`HubHandle::register`].
///
/// The hub holds the only strong sender of `outbound`; once it drops the
/// client, `outbound` yields `None`. `replies` lets the connection queue
/// direct replies without keeping the queue alive.
#[derive(Debug)]
pub struct ClientLink {
    /// Identifier assigned to the connection.
    pub id: ConnectionId,
    /// Messages to write to the socket.
    pub outbound: mpsc::Receiver<String>,
    /// Weak sender into the same queue.
    pub replies: mpsc::WeakSender<String>,
}

/// Cloneable front end of a running [`PushHub`].
#[derive(Debug, Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<Registration>,
    unregister_tx: mpsc::Sender<ConnectionId>,
    broadcast_tx: mpsc::Sender<String>,
    live: watch::Receiver<usize>,
    config: HubConfig,
}

impl HubHandle {
    /// Registers a new connection with a bounded outbound queue.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Queue`] if the hub has stopped.
    pub async fn register(&self) -> Result<ClientLink, AppError> {
        let (tx, rx) = mpsc::channel(self.config.outbound_capacity);
        let replies = tx.downgrade();
        let id = ConnectionId::new();
        self.register_tx
            .send(Registration { id, outbound: tx })
            .await
            .map_err(|_| AppError::Queue("push hub is not running".to_string()))?;
        Ok(ClientLink {
            id,
            outbound: rx,
            replies,
        })
    }

    /// Removes a connection. Unknown or already removed IDs are ignored.
    pub async fn unregister(&self, id: ConnectionId) {
        if self.unregister_tx.send(id).await.is_err() {
            debug!(connection_id = %id, "unregister after hub shutdown");
        }
    }

    /// Current number of registered connections.
    #[must_use]
    pub fn live_connections(&self) -> usize {
        *self.live.borrow()
    }

    /// Receiver that observes every change of the connection count.
    #[must_use]
    pub fn watch_connections(&self) -> watch::Receiver<usize> {
        self.live.clone()
    }

    /// Limits and intervals this hub was built with.
    #[must_use]
    pub const fn config(&self) -> &HubConfig {
        &self.config
    }
}

#[async_trait]
impl Broadcaster for HubHandle {
    async fn broadcast(&self, message: String) -> Result<(), AppError> {
        self.broadcast_tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => {
                AppError::Queue("broadcast mailbox full, message dropped".to_string())
            }
            TrySendError::Closed(_) => AppError::Queue("push hub is not running".to_string()),
        })
    }
}

/// The coordinator task state.
#[derive(Debug)]
pub struct PushHub {
    clients: HashMap<ConnectionId, mpsc::Sender<String>>,
    register_rx: mpsc::Receiver<Registration>,
    unregister_rx: mpsc::Receiver<ConnectionId>,
    broadcast_rx: mpsc::Receiver<String>,
    live: watch::Sender<usize>,
    config: HubConfig,
}

impl PushHub {
    /// Creates a hub and the handle used to reach it.
    #[must_use]
    pub fn new(config: HubConfig) -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (unregister_tx, unregister_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_capacity);
        let (live, live_rx) = watch::channel(0);

        let handle = HubHandle {
            register_tx,
            unregister_tx,
            broadcast_tx,
            live: live_rx,
            config: config.clone(),
        };
        let hub = Self {
            clients: HashMap::new(),
            register_rx,
            unregister_rx,
            broadcast_rx,
            live,
            config,
        };
        (hub, handle)
    }

    /// Spawns [`Self::run`] on the Tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Serves events until every [`HubHandle`] is dropped.
    pub async fn run(mut self) {
        let period = self.config.heartbeat_interval;
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("push hub started");
        loop {
            tokio::select! {
                registration = self.register_rx.recv() => match registration {
                    Some(registration) => self.add(registration),
                    None => break,
                },
                Some(id) = self.unregister_rx.recv() => self.remove(id),
                Some(message) = self.broadcast_rx.recv() => {
                    let delivered = self.fan_out(&message);
                    debug!(delivered, "broadcast fanned out");
                }
                _ = heartbeat.tick() => {
                    self.send_heartbeat();
                }
            }
        }

        self.clients.clear();
        self.publish_count();
        info!("push hub stopped");
    }

    fn add(&mut self, registration: Registration) {
        self.clients.insert(registration.id, registration.outbound);
        self.publish_count();
        info!(connection_id = %registration.id, total = self.clients.len(), "client connected");
    }

    fn remove(&mut self, id: ConnectionId) {
        if self.clients.remove(&id).is_some() {
            self.publish_count();
            info!(connection_id = %id, remaining = self.clients.len(), "client disconnected");
        }
    }

    /// Queues `payload` for every client. A client whose queue is full or
    /// closed is dropped on the spot. Returns how many clients remain.
    fn fan_out(&mut self, payload: &str) -> usize {
        let before = self.clients.len();
        self.clients.retain(|id, outbound| match outbound.try_send(payload.to_owned()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(connection_id = %id, "outbound queue full, evicting client");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection_id = %id, "outbound queue closed, dropping client");
                false
            }
        });
        if self.clients.len() != before {
            self.publish_count();
        }
        self.clients.len()
    }

    /// Sends a heartbeat if anyone is listening. Returns whether one was sent.
    fn send_heartbeat(&mut self) -> bool {
        if self.clients.is_empty() {
            return false;
        }
        match WsMessage::heartbeat().to_json() {
            Ok(message) => {
                let delivered = self.fan_out(&message);
                debug!(clients = delivered, "heartbeat sent");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to encode heartbeat");
                false
            }
        }
    }

    fn publish_count(&self) {
        self.live.send_replace(self.clients.len());
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ws::messages::MessageType;

    fn config(outbound_capacity: usize) -> HubConfig {
        HubConfig {
            outbound_capacity,
            ..HubConfig::default()
        }
    }

    fn link(hub: &mut PushHub, capacity: usize) -> (ConnectionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = ConnectionId::new();
        hub.add(Registration { id, outbound: tx });
        (id, rx)
    }

    #[test]
    fn fan_out_reaches_every_client() {
        let (mut hub, handle) = PushHub::new(config(8));
        let (_, mut a) = link(&mut hub, 8);
        let (_, mut b) = link(&mut hub, 8);

        assert_eq!(hub.fan_out("hello"), 2);
        assert_eq!(a.try_recv().ok().as_deref(), Some("hello"));
        assert_eq!(b.try_recv().ok().as_deref(), Some("hello"));
        assert_eq!(handle.live_connections(), 2);
    }

    #[test]
    fn full_queue_evicts_only_that_client() {
        let (mut hub, handle) = PushHub::new(config(1));
        let (_, mut slow) = link(&mut hub, 1);
        let (_, mut fast) = link(&mut hub, 4);

        assert_eq!(hub.fan_out("one"), 2);
        assert_eq!(fast.try_recv().ok().as_deref(), Some("one"));
        assert_eq!(hub.fan_out("two"), 1);

        assert_eq!(handle.live_connections(), 1);
        assert_eq!(slow.try_recv().ok().as_deref(), Some("one"));
        assert!(matches!(
            slow.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert_eq!(fast.try_recv().ok().as_deref(), Some("two"));
    }

    #[test]
    fn closed_queue_is_dropped() {
        let (mut hub, handle) = PushHub::new(config(4));
        let (_, gone) = link(&mut hub, 4);
        drop(gone);

        assert_eq!(hub.fan_out("x"), 0);
        assert_eq!(handle.live_connections(), 0);
    }

    #[test]
    fn double_unregister_is_a_no_op() {
        let (mut hub, handle) = PushHub::new(config(4));
        let (id, _rx) = link(&mut hub, 4);
        let (_, _other) = link(&mut hub, 4);

        hub.remove(id);
        hub.remove(id);
        assert_eq!(handle.live_connections(), 1);
    }

    #[test]
    fn heartbeat_needs_an_audience() {
        let (mut hub, _handle) = PushHub::new(config(4));
        assert!(!hub.send_heartbeat());

        let (_, mut rx) = link(&mut hub, 4);
        assert!(hub.send_heartbeat());

        let Ok(text) = rx.try_recv() else {
            panic!("heartbeat should be queued");
        };
        let Ok(message) = serde_json::from_str::<WsMessage>(&text) else {
            panic!("heartbeat should parse");
        };
        assert_eq!(message.kind, MessageType::Heartbeat);
    }

    #[tokio::test]
    async fn handle_round_trip_through_running_hub() {
        let (hub, handle) = PushHub::new(config(8));
        let task = hub.spawn();

        let Ok(mut first) = handle.register().await else {
            panic!("register should succeed");
        };
        let Ok(mut second) = handle.register().await else {
            panic!("register should succeed");
        };
        let mut live = handle.watch_connections();
        assert!(live.wait_for(|n| *n == 2).await.is_ok());

        assert!(handle.broadcast("tick".to_string()).await.is_ok());
        assert_eq!(first.outbound.recv().await.as_deref(), Some("tick"));
        assert_eq!(second.outbound.recv().await.as_deref(), Some("tick"));

        handle.unregister(first.id).await;
        handle.unregister(first.id).await;
        assert!(live.wait_for(|n| *n == 1).await.is_ok());
        assert_eq!(first.outbound.recv().await, None);

        drop(second);
        drop(live);
        drop(handle);
        assert!(task.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn running_hub_emits_heartbeats() {
        let (hub, handle) = PushHub::new(HubConfig {
            heartbeat_interval: Duration::from_secs(15),
            ..HubConfig::default()
        });
        let _task = hub.spawn();

        let Ok(mut link) = handle.register().await else {
            panic!("register should succeed");
        };
        let mut live = handle.watch_connections();
        assert!(live.wait_for(|n| *n == 1).await.is_ok());

        let Ok(Some(text)) =
            tokio::time::timeout(Duration::from_secs(16), link.outbound.recv()).await
        else {
            panic!("expected a heartbeat within one interval");
        };
        assert!(text.contains("server_ok_"));
    }

    #[tokio::test]
    async fn hub_from_zero_interval_env_keeps_running() {
        let Ok(server) = crate::config::ServerConfig::from_lookup(|key| {
            matches!(key, "WS_HEARTBEAT_SECS" | "WS_PING_SECS").then(|| "0".to_string())
        }) else {
            panic!("config should load");
        };
        let (hub, handle) = PushHub::new(server.hub);
        let task = hub.spawn();

        let Ok(mut link) = handle.register().await else {
            panic!("register should succeed");
        };
        let mut live = handle.watch_connections();
        assert!(live.wait_for(|n| *n == 1).await.is_ok());

        assert!(handle.broadcast("tick".to_string()).await.is_ok());
        assert_eq!(link.outbound.recv().await.as_deref(), Some("tick"));

        drop(link);
        drop(live);
        drop(handle);
        assert!(task.await.is_ok());
    }

    #[tokio::test]
    async fn broadcast_after_shutdown_fails() {
        let (hub, handle) = PushHub::new(HubConfig::default());
        drop(hub);
        assert!(handle.broadcast("x".to_string()).await.is_err());
        assert!(handle.register().await.is_err());
    }
}
