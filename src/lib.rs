#![allow(clippy::doc_markdown)] // Allow technical terms like RFC, JSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # servicekit
//!
//! HTTP service host for axum applications: an application listener with
//! default middleware, an operations listener, and an aggregate health-check
//! engine behind the readiness endpoint.
//!
//! ## Overview
//!
//! A service hands servicekit its `axum::Router`. servicekit serves it with
//! request IDs, W3C trace context and tracing spans, Prometheus request
//! metrics, request logging, timeouts, panic recovery, optional
//! authentication, and RFC 7807 problem responses. A second listener
//! exposes `/metrics`, `/info`, `/uptime`, `PUT /log/level`, and the
//! liveness and readiness endpoints.
//!
//! ## Health Model
//!
//! Components register a [`health::HealthChecker`] with a name, a criticality
//! flag, tags, and a timeout. Readiness runs every check concurrently under a
//! cancellable [`health::CheckContext`] and folds the results:
//!
//! - a critical component `DOWN` makes the service `DOWN` (HTTP 503)
//! - any `DEGRADED` result, or a non-critical `DOWN`, makes it `DEGRADED` (HTTP 200)
//! - otherwise the service is `UP` (HTTP 200)
//!
//! ## Module Organization
//!
//! - [`health`] - checks, registrations, context, aggregation, reports
//! - [`server`] - listener lifecycle and graceful shutdown
//! - [`web`] - routers, handlers, and middleware
//! - [`config`] - layered configuration
//! - [`logging`] - tracing setup and runtime log level
//! - [`metrics`] - Prometheus instruments
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use servicekit::health::{check_fn, ComponentRegistration, HealthStatus};
//! use servicekit::{logging, shutdown_signal, Server, ServerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! logging::init_tracing();
//!
//! let config = ServerConfig::load()?.with_health_checks().with_metrics();
//! let server = Server::new(config, Router::new().route("/", get(|| async { "hello" })))?;
//!
//! server.register_health_check(
//!     ComponentRegistration::new("database", check_fn(|_ctx| async { HealthStatus::Up }))
//!         .critical(true),
//! );
//!
//! let shutdown = server.shutdown_handle();
//! tokio::spawn(async move {
//!     shutdown_signal().await;
//!     shutdown.shutdown(Duration::from_secs(30));
//! });
//!
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod web;

pub use config::ServerConfig;
pub use error::{Result, ServiceKitError};
pub use health::{
    check_fn, CheckContext, ComponentRegistration, HealthAggregator, HealthChecker, HealthReport,
    HealthStatus,
};
pub use logging::LogLevelHandle;
pub use server::{shutdown_signal, BoundServer, Server, ShutdownHandle};
pub use web::errors::{ApiError, ProblemDetails};
pub use web::middleware::auth::{
    require_authenticated, require_role, AuthError, HttpAuthenticator, Principal, RequiredRole,
};
pub use web::middleware::trace::TraceContext;
