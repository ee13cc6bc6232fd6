//! Liveness and readiness endpoints over real HTTP.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use servicekit::health::{check_fn, CheckContext, ComponentRegistration, HealthStatus};

use super::test_infrastructure::{test_config, test_router, TestResult, TestServer};

fn fixed(name: &str, status: HealthStatus, critical: bool) -> ComponentRegistration {
    ComponentRegistration::new(name, check_fn(move |_ctx| async move { status })).critical(critical)
}

fn assert_no_cache(response: &reqwest::Response) {
    let headers = response.headers();
    assert_eq!(
        headers["cache-control"],
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(headers["pragma"], "no-cache");
    assert_eq!(headers["expires"], "0");
}

async fn explode(_ctx: CheckContext) -> HealthStatus {
    panic!("check blew up")
}

#[tokio::test]
async fn test_liveness() -> TestResult {
    let server = TestServer::start().await?;

    let response = server.get_ops("/healthz/live").await?;
    assert_eq!(response.status(), 200);
    assert_no_cache(&response);
    assert!(response.headers()["content-type"]
        .to_str()?
        .starts_with("application/json"));

    let body: Value = response.json().await?;
    assert_eq!(body, serde_json::json!({ "status": "UP" }));

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_liveness_does_not_run_checks() -> TestResult {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let server = TestServer::start_with(test_config(), test_router(), move |server| {
        server.register_health_check(
            ComponentRegistration::new(
                "counted",
                check_fn(move |_ctx| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { HealthStatus::Down }
                }),
            )
            .critical(true),
        );
    })
    .await?;

    let response = server.get_ops("/healthz/live").await?;
    assert_eq!(response.status(), 200);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_readiness_with_no_checks_is_up() -> TestResult {
    let server = TestServer::start().await?;

    let response = server.get_ops("/healthz/ready").await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-health-status"], "UP");
    assert_no_cache(&response);

    let body: Value = response.json().await?;
    assert_eq!(body["status"], "UP");
    assert_eq!(body["components"].as_array().map(Vec::len), Some(0));
    assert!(body["timestamp"].is_string());

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_readiness_statuses() -> TestResult {
    let server = TestServer::start().await?;
    server.health.register(fixed("db", HealthStatus::Up, true).with_tags(["database"]));

    let response = server.get_ops("/healthz/ready").await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-health-status"], "UP");
    let body: Value = response.json().await?;
    assert_eq!(body["components"][0]["name"], "db");
    assert_eq!(body["components"][0]["tags"][0], "database");

    // a non-critical failure degrades but keeps the pod in rotation
    server.health.register(fixed("cache", HealthStatus::Down, false));
    let response = server.get_ops("/healthz/ready").await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-health-status"], "DEGRADED");

    // a critical failure takes it out
    server.health.register(fixed("queue", HealthStatus::Down, true));
    let response = server.get_ops("/healthz/ready").await?;
    assert_eq!(response.status(), 503);
    assert_eq!(response.headers()["x-health-status"], "DOWN");
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "DOWN");
    assert_eq!(body["components"].as_array().map(Vec::len), Some(3));

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_readiness_check_timeout() -> TestResult {
    let server = TestServer::start().await?;
    server.health.register(
        ComponentRegistration::new(
            "slow",
            check_fn(|ctx: CheckContext| async move {
                ctx.run(tokio::time::sleep(Duration::from_secs(10)))
                    .await
                    .map(|_| HealthStatus::Up)
                    .unwrap_or(HealthStatus::Down)
            }),
        )
        .critical(true)
        .with_timeout(Duration::from_millis(100)),
    );

    let started = Instant::now();
    let response = server.get_ops("/healthz/ready").await?;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(response.status(), 503);

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_readiness_timeout_caps_checks() -> TestResult {
    let config = test_config().with_readiness_timeout(Duration::from_millis(100));
    let server = TestServer::start_with(config, test_router(), |server| {
        server.register_health_check(
            ComponentRegistration::new(
                "patient",
                check_fn(|ctx: CheckContext| async move {
                    ctx.done().await;
                    HealthStatus::Down
                }),
            )
            .with_timeout(Duration::from_secs(30)),
        );
    })
    .await?;

    let started = Instant::now();
    let response = server.get_ops("/healthz/ready").await?;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-health-status"], "DEGRADED");

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_panicking_check_is_down_and_server_survives() -> TestResult {
    let server = TestServer::start().await?;
    server
        .health
        .register(ComponentRegistration::new("fragile", check_fn(explode)).critical(true));

    let response = server.get_ops("/healthz/ready").await?;
    assert_eq!(response.status(), 503);
    let body: Value = response.json().await?;
    assert_eq!(body["components"][0]["status"], "DOWN");

    let response = server.get_ops("/healthz/live").await?;
    assert_eq!(response.status(), 200);

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_health_routes_absent_when_disabled() -> TestResult {
    let mut config = test_config();
    config.health_enabled = false;
    let server = TestServer::start_with(config, test_router(), |_| {}).await?;

    assert_eq!(server.get_ops("/healthz/live").await?.status(), 404);
    assert_eq!(server.get_ops("/healthz/ready").await?.status(), 404);

    server.stop().await??;
    Ok(())
}
