//! # Panic Recovery Middleware
//!
//! Turns a panicking handler into a 500 problem response. The connection and
//! the server keep running.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::error;

use crate::health::aggregator::panic_message;
use crate::web::errors::ProblemDetails;

pub async fn recover_panics(request: Request, next: Next) -> Response {
    let uri = request.uri().clone();
    let method = request.method().clone();
    let extensions = request.extensions().clone();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(
                %method,
                path = %uri.path(),
                panic = %message,
                "Panic recovered while handling request"
            );
            ProblemDetails::internal_server_error()
                .with_request_context(&uri, &extensions)
                .into_response()
        }
    }
}
