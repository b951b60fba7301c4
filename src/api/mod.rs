//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints and the WebSocket upgrade are mounted under `/api/v1`;
//! `/health` sits at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI description of the read API.
#[derive(Debug, OpenApi)]
#[openapi(
    paths(
        handlers::system::health_handler,
        handlers::lend::lend_detail,
        handlers::borrow::borrow_detail,
    ),
    components(schemas(
        crate::domain::LendSnapshot,
        crate::domain::CollateralSnapshot,
        dto::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "System", description = "Liveness"),
        (name = "Lend", description = "Lend market snapshots"),
        (name = "Borrow", description = "Collateral snapshots"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

/// Router with tracing and CORS layers, bound to `state`.
pub fn build_app(state: AppState) -> Router {
    build_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::HubConfig;
    use crate::domain::{LEND_TYPE_USDC, NewCollateralSnapshot, NewLendSnapshot, SYSTEM_IDENTITY};
    use crate::persistence::{MemorySnapshotStore, SnapshotStore};
    use crate::ws::PushHub;

    fn app(store: &Arc<MemorySnapshotStore>) -> Router {
        let (_hub, handle) = PushHub::new(HubConfig::default());
        build_app(AppState {
            snapshots: Arc::clone(store) as Arc<dyn SnapshotStore>,
            hub: handle,
        })
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let Ok(request) = Request::builder().uri(uri).body(Body::empty()) else {
            panic!("request should build");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router should respond");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn lend_detail_is_404_before_first_snapshot() {
        let store = Arc::new(MemorySnapshotStore::new());
        let (status, body) = get(app(&store), "/api/v1/lend/detail").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body.pointer("/error/code").and_then(serde_json::Value::as_u64),
            Some(2001)
        );
    }

    #[tokio::test]
    async fn lend_detail_returns_latest_row() {
        let store = Arc::new(MemorySnapshotStore::new());
        for borrow in ["1000", "1200"] {
            let _ = store
                .insert_lend(&NewLendSnapshot {
                    kind: LEND_TYPE_USDC,
                    total_borrow: borrow.to_string(),
                    total_deposits: "2000".to_string(),
                    utilization_rate: 500,
                    interest_rate: 300,
                    stamped_at: 1,
                    identity: SYSTEM_IDENTITY.to_string(),
                })
                .await;
        }

        let (status, body) = get(app(&store), "/api/v1/lend/detail").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body.pointer("/total_borrow").and_then(serde_json::Value::as_str),
            Some("1200")
        );
    }

    #[tokio::test]
    async fn borrow_detail_filters_by_collateral_type() {
        let store = Arc::new(MemorySnapshotStore::new());
        let _ = store
            .insert_collateral(&NewCollateralSnapshot {
                token_address: "0x4200000000000000000000000000000000000006".to_string(),
                kind: 2,
                borrowed: "10".to_string(),
                borrowable: "90".to_string(),
                utilization_rate: 1_002,
                interest_rate: 250,
                health_factor: 180,
                liquidation_threshold: 8_000,
                collateralization_rate: 7_000,
                stamped_at: 1,
                identity: SYSTEM_IDENTITY.to_string(),
            })
            .await;

        let (status, body) = get(app(&store), "/api/v1/borrow/detail?collateralAsset=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.pointer("/type").and_then(serde_json::Value::as_i64), Some(2));

        let (status, _) = get(app(&store), "/api/v1/borrow/detail?collateralAsset=1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get(app(&store), "/api/v1/borrow/detail").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_connections() {
        let store = Arc::new(MemorySnapshotStore::new());
        let (status, body) = get(app(&store), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.pointer("/status").and_then(serde_json::Value::as_str), Some("healthy"));
        assert_eq!(body.pointer("/connections").and_then(serde_json::Value::as_u64), Some(0));
    }

    #[test]
    fn openapi_lists_read_endpoints() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/lend/detail"));
        assert!(doc.paths.paths.contains_key("/api/v1/borrow/detail"));
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
