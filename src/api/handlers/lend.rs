//! Lend market snapshot endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::domain::{LEND_TYPE_USDC, LendSnapshot};
use crate::error::{AppError, ErrorResponse};

/// `GET /lend/detail`: Latest lend market snapshot.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] before the first `StatusChanged` event has
/// been indexed.
#[utoipa::path(
    get,
    path = "/api/v1/lend/detail",
    tag = "Lend",
    summary = "Latest lend snapshot",
    description = "Returns the most recently inserted lend market row.",
    responses(
        (status = 200, description = "Latest lend snapshot", body = LendSnapshot),
        (status = 404, description = "Nothing indexed yet", body = ErrorResponse),
    )
)]
pub async fn lend_detail(State(state): State<AppState>) -> Result<Json<LendSnapshot>, AppError> {
    state
        .snapshots
        .latest_lend(LEND_TYPE_USDC)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no lend snapshot for type {LEND_TYPE_USDC}")))
}

/// Lend routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/lend/detail", get(lend_detail))
}
