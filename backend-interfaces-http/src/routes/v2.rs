use axum::routing::{get, post};
use axum::Router;

use backend_application::AppState;

use crate::handlers::{ops_handlers, scan_handlers};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v2/scans",
            post(scan_handlers::create_scan).get(scan_handlers::list_scans),
        )
        .route("/v2/scans/sync", post(scan_handlers::sync_all_scans))
        .route("/v2/scans/:id", get(scan_handlers::get_scan))
        .route("/v2/scans/:id/sync", post(scan_handlers::sync_scan))
        .route("/v2/ops/health/live", get(ops_handlers::health_live))
        .route("/v2/ops/health/ready", get(ops_handlers::health_ready))
        .route(
            "/v2/ops/metrics/prometheus",
            get(ops_handlers::metrics_prometheus),
        )
        .with_state(state)
}
