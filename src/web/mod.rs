//! # Web Module
//!
//! Axum wiring for the two listeners a service runs.
//!
//! ## Architecture Overview
//!
//! ```text
//!  application listener (default :8080)        operations listener (default :8082)
//!  ───────────────────────────────────         ─────────────────────────────────
//!  request id                                   request id
//!  trace context (X-Trace-Id, X-Sampled)        trace context
//!  trace span "METHOD /route"                   trace span
//!  request metrics ──▶ HttpMetrics              problem rendering
//!  request logging                              /info  /uptime  PUT /log/level
//!  problem rendering (405, 408)                 /metrics            (metrics_enabled)
//!  request timeout                              {base}/live, /ready (health_enabled)
//!  panic recovery
//!  authentication (when configured)
//!  host router + 404 fallback
//! ```
//!
//! ## Core Components
//!
//! - [`routes`] - operational route groups
//! - [`handlers`] - health, ops, and fallback handlers
//! - [`middleware`] - request id, trace context, metrics, logging, problem rendering,
//!   panic recovery, authentication
//! - [`errors`] - RFC 7807 problem details and [`errors::ApiError`]
//! - [`state`] - state shared by the operational handlers

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::metrics::HttpMetrics;
use middleware::auth::HttpAuthenticator;
use middleware::trace::RequestSpan;
use state::OpsState;

/// Wrap the host's router with the default application middleware.
///
/// Unmatched routes get a 404 problem response. The host's own fallback, if
/// any, is replaced. With an authenticator every request carries a
/// [`Principal`](middleware::auth::Principal); enforcing it is left to the
/// host's routes.
pub fn create_app(
    router: Router,
    metrics: Option<HttpMetrics>,
    request_timeout: Option<Duration>,
    authenticator: Option<Arc<dyn HttpAuthenticator>>,
) -> Router {
    let mut app = router.fallback(handlers::not_found);

    if let Some(authenticator) = authenticator {
        app = app.layer(axum::middleware::from_fn_with_state(
            authenticator,
            middleware::auth::authenticate,
        ));
    }

    app = app.layer(axum::middleware::from_fn(
        middleware::recovery::recover_panics,
    ));

    if let Some(timeout) = request_timeout {
        app = app.layer(TimeoutLayer::new(timeout));
    }

    app = app
        .layer(axum::middleware::from_fn(
            middleware::problems::render_problems,
        ))
        .layer(axum::middleware::from_fn(
            middleware::logging::log_requests,
        ));

    if let Some(metrics) = metrics {
        app = app.layer(axum::middleware::from_fn_with_state(
            metrics,
            middleware::metrics::track_metrics,
        ));
    }

    app.layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
        .layer(axum::middleware::from_fn(
            middleware::trace::propagate_trace,
        ))
        .layer(axum::middleware::from_fn(
            middleware::request_id::add_request_id,
        ))
}

/// Build the operations router from the enabled features.
pub fn create_ops_app(state: OpsState) -> Router {
    let config = state.config.clone();

    let mut router = Router::new().merge(routes::ops_routes());

    if config.metrics_enabled {
        router = router.merge(routes::metrics_routes());
    }

    if config.health_enabled {
        router = router.merge(routes::health_routes(&config.health_base_path));
    }

    router
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn(
            middleware::problems::render_problems,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
        .layer(axum::middleware::from_fn(
            middleware::trace::propagate_trace,
        ))
        .layer(axum::middleware::from_fn(
            middleware::request_id::add_request_id,
        ))
        .with_state(state)
}
