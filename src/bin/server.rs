//! # servicekit demo server
//!
//! Serves a small application with a couple of health checks registered.
//!
//! ```bash
//! SERVICEKIT_HEALTH_ENABLED=true SERVICEKIT_METRICS_ENABLED=true cargo run --bin servicekit-demo
//! curl localhost:8082/healthz/ready
//! curl -H 'Authorization: Bearer demo-admin' localhost:8080/admin
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use axum::http::request::Parts;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;
use tracing::info;

use servicekit::health::{check_fn, CheckContext, ComponentRegistration, HealthStatus};
use servicekit::{
    logging, require_role, shutdown_signal, AuthError, HttpAuthenticator, Principal, RequiredRole,
    Server, ServerConfig,
};

async fn demo_panic() -> &'static str {
    panic!("demo panic")
}

/// Accepts the single bearer token `demo-admin`
struct DemoAuthenticator;

#[async_trait]
impl HttpAuthenticator for DemoAuthenticator {
    async fn authenticate(&self, parts: &Parts) -> Result<Principal, AuthError> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        Ok(match token {
            Some("demo-admin") => Principal::authenticated("demo", "demo-admin").with_role("admin"),
            _ => Principal::anonymous(),
        })
    }
}

async fn admin(Extension(principal): Extension<Principal>) -> Json<serde_json::Value> {
    Json(json!({ "name": principal.name(), "subject": principal.subject_id() }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let config = ServerConfig::load().context("failed to load configuration")?;
    let grace = config.shutdown_grace_period();

    let hits = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&hits);
    let router = Router::new()
        .route(
            "/",
            get(move || {
                let count = counter.fetch_add(1, Ordering::Relaxed) + 1;
                async move { Json(json!({ "message": "hello", "hits": count })) }
            }),
        )
        .route("/panic", get(demo_panic))
        .merge(
            Router::new()
                .route("/admin", get(admin))
                .layer(axum::middleware::from_fn_with_state(
                    RequiredRole::new("admin"),
                    require_role,
                )),
        );

    let server = Server::new(config, router)
        .context("invalid server configuration")?
        .with_service_info("servicekit-demo", env!("CARGO_PKG_VERSION"))
        .with_authenticator(DemoAuthenticator);

    server.register_health_check(
        ComponentRegistration::new("process", check_fn(|_ctx| async { HealthStatus::Up }))
            .critical(true)
            .with_tags(["core"]),
    );

    // Pretends to check a dependency that gets slower under load
    let load = Arc::clone(&hits);
    server.register_health_check(
        ComponentRegistration::new(
            "upstream",
            check_fn(move |ctx: CheckContext| {
                let load = load.load(Ordering::Relaxed);
                async move {
                    let latency = Duration::from_millis(10 * (load % 50));
                    match ctx.run(tokio::time::sleep(latency)).await {
                        Some(()) if latency < Duration::from_millis(250) => HealthStatus::Up,
                        Some(()) => HealthStatus::Degraded,
                        None => HealthStatus::Down,
                    }
                }
            }),
        )
        .critical(false)
        .with_tags(["dependency"])
        .with_timeout(Duration::from_millis(300)),
    );

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.shutdown(grace);
    });

    server.start().await.context("server stopped with error")?;
    info!("Server shutdown complete");
    Ok(())
}
