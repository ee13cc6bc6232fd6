//! # Web Handlers

pub mod health;
pub mod ops;

use axum::extract::Request;
use axum::response::Response;

use crate::web::errors::ApiError;

/// Fallback for unmatched routes on both listeners.
pub async fn not_found(request: Request) -> Response {
    ApiError::NotFound.into_response_for(request.uri(), request.extensions())
}
