//! # Request Metrics Middleware
//!
//! Records request latency and in-flight requests on [`HttpMetrics`].

use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::metrics::{HttpMetrics, UNDEFINED_ROUTE};

/// Route label for a request: the matched route template, or `"undefined"`.
///
/// Raw paths are never used so label cardinality stays bounded.
pub fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNDEFINED_ROUTE.to_string())
}

pub async fn track_metrics(
    State(metrics): State<HttpMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let route = route_label(&request);

    let _in_flight = metrics.request_started();
    let start = Instant::now();

    let response = next.run(request).await;

    metrics.request_finished(&method, &route, response.status().as_u16(), start.elapsed());
    response
}
