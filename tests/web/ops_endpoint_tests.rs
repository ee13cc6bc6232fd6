//! Operational endpoints: metrics, info, uptime, log level.

use serde_json::{json, Value};

use super::test_infrastructure::{test_config, test_router, TestResult, TestServer};

#[tokio::test]
async fn test_metrics_exposes_request_histogram() -> TestResult {
    let server = TestServer::start().await?;

    assert_eq!(server.get_app("/users/42").await?.status(), 200);
    assert_eq!(server.get_app("/no/such/route").await?.status(), 404);

    let response = server.get_ops("/metrics").await?;
    assert_eq!(response.status(), 200);
    assert!(response.headers()["content-type"]
        .to_str()?
        .starts_with("text/plain"));

    let text = response.text().await?;
    assert!(text.contains("http_server_request_duration_seconds_bucket"));
    assert!(text.contains("route=\"/users/:id\""));
    assert!(text.contains("route=\"undefined\""));
    assert!(!text.contains("/users/42"));
    assert!(text.contains("http_server_requests_in_flight"));

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_metrics_absent_when_disabled() -> TestResult {
    let mut config = test_config();
    config.metrics_enabled = false;
    let server = TestServer::start_with(config, test_router(), |_| {}).await?;

    assert_eq!(server.get_ops("/metrics").await?.status(), 404);

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_info() -> TestResult {
    let config = test_config();
    let server = TestServer::start_with(config, test_router(), |_| {}).await?;

    let body: Value = server.get_ops("/info").await?.json().await?;
    assert_eq!(body["name"], "servicekit");
    assert!(body["version"].is_string());
    assert_eq!(body["features"]["metrics"], true);
    assert_eq!(body["features"]["health"], true);
    assert_eq!(body["features"]["health_base_path"], "/healthz");

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_uptime() -> TestResult {
    let server = TestServer::start().await?;

    let body: Value = server.get_ops("/uptime").await?.json().await?;
    assert!(body["uptime"].as_str().is_some_and(|s| s.ends_with('s')));
    assert!(body["uptime_seconds"].as_u64().is_some());
    let start = body["start"].as_str().unwrap_or_default();
    assert!(chrono::DateTime::parse_from_rfc3339(start).is_ok());

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_log_level_change() -> TestResult {
    let server = TestServer::start().await?;

    let response = server
        .put_ops_json("/log/level", &json!({ "level": "debug" }))
        .await?;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body, json!({ "success": true }));

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_log_level_rejects_unknown_level() -> TestResult {
    let server = TestServer::start().await?;

    let response = server
        .put_ops_json("/log/level", &json!({ "level": "chatty" }))
        .await?;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some_and(|e| e.contains("chatty")));

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_log_level_rejects_malformed_body() -> TestResult {
    let server = TestServer::start().await?;

    let response = server
        .client
        .put(server.ops_url("/log/level"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    // wrong method on a known route
    let response = server.get_ops("/log/level").await?;
    assert_eq!(response.status(), 405);

    server.stop().await??;
    Ok(())
}
