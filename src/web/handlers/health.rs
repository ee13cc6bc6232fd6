//! # Health Check Handlers
//!
//! Kubernetes-compatible liveness and readiness endpoints backed by the
//! [`HealthAggregator`](crate::health::HealthAggregator).

use axum::extract::State;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

use crate::health::{CheckContext, HealthStatus};
use crate::web::state::OpsState;

pub static X_HEALTH_STATUS: HeaderName = HeaderName::from_static("x-health-status");

/// Headers that keep health responses from being served by caches
pub fn no_cache_headers() -> [(HeaderName, HeaderValue); 3] {
    [
        (
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ),
        (header::PRAGMA, HeaderValue::from_static("no-cache")),
        (header::EXPIRES, HeaderValue::from_static("0")),
    ]
}

/// Liveness: GET {base}/live
///
/// Reports that the process is serving requests. Never runs checks.
pub async fn liveness() -> Response {
    (
        StatusCode::OK,
        no_cache_headers(),
        Json(json!({ "status": HealthStatus::Up })),
    )
        .into_response()
}

/// Readiness: GET {base}/ready
///
/// Runs every registered check concurrently and answers 200 for `UP` and
/// `DEGRADED`, 503 for `DOWN`. Dropping the request (client disconnect)
/// cancels the checks still running.
pub async fn readiness(State(state): State<OpsState>) -> Response {
    let ctx = match state.readiness_timeout() {
        Some(timeout) => CheckContext::with_timeout(timeout),
        None => CheckContext::background(),
    };
    let _cancel_on_drop = ctx.drop_guard();

    let report = state.health.evaluate(&ctx).await;
    debug!(
        status = %report.status,
        components = report.components.len(),
        "Readiness evaluated"
    );

    (
        report.status.status_code(),
        no_cache_headers(),
        [(
            X_HEALTH_STATUS.clone(),
            HeaderValue::from_static(report.status.as_str()),
        )],
        Json(report),
    )
        .into_response()
}
