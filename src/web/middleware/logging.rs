//! # Request Logging Middleware

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};

use super::request_id::{CorrelationId, RequestId};

/// Log one line per completed request.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.as_str().to_string())
        .unwrap_or_default();
    let correlation_id = request
        .extensions()
        .get::<CorrelationId>()
        .map(|id| id.as_str().to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        warn!(
            %method,
            path = %path,
            status,
            latency_ms,
            request_id = %request_id,
            correlation_id = correlation_id.as_deref(),
            "HTTP request failed"
        );
    } else {
        info!(
            %method,
            path = %path,
            status,
            latency_ms,
            request_id = %request_id,
            correlation_id = correlation_id.as_deref(),
            "HTTP request"
        );
    }

    response
}
