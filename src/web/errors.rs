//! # Web Error Responses
//!
//! RFC 7807 problem details and the API error enum rendered through them.

use std::collections::BTreeMap;

use axum::http::{header, Extensions, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::web::middleware::request_id::{CorrelationId, RequestId};
use crate::web::middleware::trace::TraceContext;

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

const RESERVED_KEYS: [&str; 6] = ["type", "title", "detail", "status", "instance", "violations"];

/// Problem details object (RFC 7807)
///
/// Extensions serialize after the core members in key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub detail: String,
    pub instance: String,
    pub status: u16,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, serde_json::Value>,
    #[serde(skip)]
    allow: Option<String>,
}

impl ProblemDetails {
    pub fn new(title: impl Into<String>, status: StatusCode) -> Self {
        Self {
            problem_type: "about:blank".to_string(),
            title: title.into(),
            detail: String::new(),
            instance: String::new(),
            status: status.as_u16(),
            extensions: BTreeMap::new(),
            allow: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    /// Add an extension member. Keys that collide with core members are ignored.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let key = key.into();
        if !RESERVED_KEYS.contains(&key.as_str()) {
            self.extensions.insert(key, value.into());
        }
        self
    }

    /// Fill the instance and correlation identifiers from the request being answered.
    pub fn with_request_context(mut self, uri: &Uri, extensions: &Extensions) -> Self {
        if self.instance.trim().is_empty() {
            self.instance = uri.path().to_string();
        }
        if let Some(RequestId(id)) = extensions.get::<RequestId>() {
            self = self.with_extension("requestId", id.clone());
        }
        if let Some(CorrelationId(id)) = extensions.get::<CorrelationId>() {
            self = self.with_extension("correlationId", id.clone());
        }
        if let Some(trace) = extensions.get::<TraceContext>() {
            self = self.with_extension("traceId", trace.trace_id.to_string());
        }
        self
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn not_found() -> Self {
        Self::new("Not Found", StatusCode::NOT_FOUND)
            .with_detail("The requested resource could not be found.")
    }

    pub fn unauthorized() -> Self {
        Self::new("Unauthorized", StatusCode::UNAUTHORIZED)
            .with_detail("The request requires valid authentication credentials.")
    }

    pub fn forbidden() -> Self {
        Self::new("Forbidden", StatusCode::FORBIDDEN)
            .with_detail("The authenticated principal is not permitted to access this resource.")
    }

    pub fn method_not_allowed(allow: Option<String>) -> Self {
        let mut problem = Self::new("Method Not Allowed", StatusCode::METHOD_NOT_ALLOWED)
            .with_detail("The requested method is not allowed on this resource.");
        problem.allow = allow;
        problem
    }

    pub fn request_timeout() -> Self {
        Self::new("Request Timeout", StatusCode::REQUEST_TIMEOUT)
            .with_detail("The server timed out waiting for the request to complete.")
    }

    pub fn internal_server_error() -> Self {
        Self::new("Internal Server Error", StatusCode::INTERNAL_SERVER_ERROR).with_detail(
            "Server encountered an internal error processing the request. Please try again later.",
        )
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match serde_json::to_vec(&self) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Failed to serialize problem response");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let mut response = (status, body).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
        );
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        if let Some(allow) = self.allow.and_then(|allow| HeaderValue::from_str(&allow).ok()) {
            headers.insert(header::ALLOW, allow);
        }
        response
    }
}

/// API errors returned by servicekit's own handlers and middleware
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Resource not found")]
    NotFound,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Missing required role: {role}")]
    Forbidden { role: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn forbidden(role: impl Into<String>) -> Self {
        Self::Forbidden { role: role.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn into_problem(self) -> ProblemDetails {
        match self {
            ApiError::NotFound => ProblemDetails::not_found(),
            ApiError::Unauthorized => ProblemDetails::unauthorized(),
            ApiError::Forbidden { role } => {
                debug!(role = %role, "Principal lacks required role");
                ProblemDetails::forbidden()
            }
            ApiError::Internal { message } => {
                error!(error = %message, "Internal error while handling request");
                ProblemDetails::internal_server_error()
            }
        }
    }

    /// Render as a problem response carrying the request's path and IDs.
    pub fn into_response_for(self, uri: &Uri, extensions: &Extensions) -> Response {
        self.into_problem()
            .with_request_context(uri, extensions)
            .into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_problem().into_response()
    }
}

impl From<crate::error::ServiceKitError> for ApiError {
    fn from(error: crate::error::ServiceKitError) -> Self {
        ApiError::internal(error.to_string())
    }
}
