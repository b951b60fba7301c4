//! REST endpoint handlers organized by resource.

pub mod borrow;
pub mod lend;
pub mod system;

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(lend::routes())
        .merge(borrow::routes())
        .route("/ws", get(ws_handler))
}
