//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::persistence::SnapshotStore;
use crate::ws::HubHandle;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Read side of the snapshot tables.
    pub snapshots: Arc<dyn SnapshotStore>,
    /// Handle to the push hub coordinator.
    pub hub: HubHandle,
}
