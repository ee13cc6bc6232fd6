//! # Route Definitions
//!
//! Operational routes, each group enabled by configuration.

use axum::routing::{get, put};
use axum::Router;

use crate::web::handlers;
use crate::web::state::OpsState;

/// Liveness and readiness under `base_path`
pub fn health_routes(base_path: &str) -> Router<OpsState> {
    Router::new()
        .route(&format!("{base_path}/live"), get(handlers::health::liveness))
        .route(&format!("{base_path}/ready"), get(handlers::health::readiness))
}

pub fn metrics_routes() -> Router<OpsState> {
    Router::new().route("/metrics", get(handlers::ops::metrics))
}

/// Always-on operational endpoints
pub fn ops_routes() -> Router<OpsState> {
    Router::new()
        .route("/info", get(handlers::ops::info))
        .route("/uptime", get(handlers::ops::uptime))
        .route("/log/level", put(handlers::ops::set_log_level))
}
