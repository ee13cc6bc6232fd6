//! # Problem Rendering Middleware
//!
//! Axum answers unsupported methods (405) and `tower_http` answers timeouts
//! (408) with empty bodies. This rewrites those into problem responses.

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::web::errors::ProblemDetails;

pub async fn render_problems(request: Request, next: Next) -> Response {
    let uri = request.uri().clone();
    let extensions = request.extensions().clone();

    let response = next.run(request).await;

    // Anything with a content type was rendered deliberately by a handler
    if response.headers().contains_key(header::CONTENT_TYPE) {
        return response;
    }

    let problem = match response.status() {
        StatusCode::METHOD_NOT_ALLOWED => {
            let allow = response
                .headers()
                .get(header::ALLOW)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            ProblemDetails::method_not_allowed(allow)
        }
        StatusCode::REQUEST_TIMEOUT => ProblemDetails::request_timeout(),
        _ => return response,
    };

    problem
        .with_request_context(&uri, &extensions)
        .into_response()
}
