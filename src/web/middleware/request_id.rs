//! # Request ID Middleware
//!
//! Propagates or generates request IDs for tracing and debugging.

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub static X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

/// Add request ID middleware
///
/// Reuses an inbound `X-Request-ID` when present, otherwise generates one. The
/// ID is stored in request extensions for handlers and echoed on the response.
/// An inbound `X-Correlation-ID` is carried along the same way.
pub async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = header_str(&request, &X_REQUEST_ID)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let correlation_id = header_str(&request, &X_CORRELATION_ID).map(str::to_string);

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));
    if let Some(correlation_id) = &correlation_id {
        request
            .extensions_mut()
            .insert(CorrelationId(correlation_id.clone()));
    }

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }
    if let Some(value) = correlation_id.and_then(|id| HeaderValue::from_str(&id).ok()) {
        response.headers_mut().insert(X_CORRELATION_ID.clone(), value);
    }

    response
}

fn header_str<'a>(request: &'a Request, name: &HeaderName) -> Option<&'a str> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Request ID wrapper for extension storage
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Caller-supplied correlation ID
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
