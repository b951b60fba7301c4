//! Collateral snapshot endpoint.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::BorrowDetailQuery;
use crate::app_state::AppState;
use crate::domain::CollateralSnapshot;
use crate::error::{AppError, ErrorResponse};

/// `GET /borrow/detail?collateralAsset=N`: Latest collateral snapshot.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] without `collateralAsset` and
/// [`AppError::NotFound`] when no row exists for that type.
#[utoipa::path(
    get,
    path = "/api/v1/borrow/detail",
    tag = "Borrow",
    summary = "Latest collateral snapshot",
    description = "Returns the most recently inserted collateral row for a collateral type.",
    params(BorrowDetailQuery),
    responses(
        (status = 200, description = "Latest collateral snapshot", body = CollateralSnapshot),
        (status = 400, description = "Missing collateralAsset", body = ErrorResponse),
        (status = 404, description = "No row for this type", body = ErrorResponse),
    )
)]
pub async fn borrow_detail(
    State(state): State<AppState>,
    Query(query): Query<BorrowDetailQuery>,
) -> Result<Json<CollateralSnapshot>, AppError> {
    let kind = query
        .collateral_asset
        .ok_or_else(|| AppError::InvalidRequest("collateralAsset is required".to_string()))?;

    state
        .snapshots
        .latest_collateral(kind)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no collateral snapshot for type {kind}")))
}

/// Borrow routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/borrow/detail", get(borrow_detail))
}
