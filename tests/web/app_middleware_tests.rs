//! Default middleware on the application listener.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::request::Parts;
use axum::routing::get;
use axum::{Extension, Router};
use serde_json::Value;
use servicekit::{
    require_authenticated, require_role, AuthError, HttpAuthenticator, Principal, RequiredRole,
    Server,
};

use super::test_infrastructure::{test_config, test_router, TestResult, TestServer};

const PROBLEM_JSON: &str = "application/problem+json";

#[tokio::test]
async fn test_host_routes_served() -> TestResult {
    let server = TestServer::start().await?;

    let response = server.get_app("/hello").await?;
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await?, "hello");

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_request_id_echoed() -> TestResult {
    let server = TestServer::start().await?;

    let response = server
        .client
        .get(server.app_url("/hello"))
        .header("X-Request-ID", "trace-me-123")
        .send()
        .await?;
    assert_eq!(response.headers()["x-request-id"], "trace-me-123");

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_problem() -> TestResult {
    let server = TestServer::start().await?;

    let response = server
        .client
        .get(server.app_url("/missing"))
        .header("X-Correlation-ID", "order-flow-7")
        .send()
        .await?;
    assert_eq!(response.status(), 404);
    assert_eq!(response.headers()["content-type"], PROBLEM_JSON);

    let body: Value = response.json().await?;
    assert_eq!(body["type"], "about:blank");
    assert_eq!(body["title"], "Not Found");
    assert_eq!(body["status"], 404);
    assert_eq!(body["instance"], "/missing");
    assert_eq!(body["correlationId"], "order-flow-7");

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_wrong_method_is_problem() -> TestResult {
    let server = TestServer::start().await?;

    let response = server.client.post(server.app_url("/hello")).send().await?;
    assert_eq!(response.status(), 405);
    assert_eq!(response.headers()["content-type"], PROBLEM_JSON);
    assert!(response.headers()["allow"].to_str()?.contains("GET"));

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_panic_is_recovered() -> TestResult {
    let server = TestServer::start().await?;

    let response = server.get_app("/panic").await?;
    assert_eq!(response.status(), 500);
    assert_eq!(response.headers()["content-type"], PROBLEM_JSON);
    let body: Value = response.json().await?;
    assert_eq!(body["title"], "Internal Server Error");
    assert!(body["requestId"].is_string());

    // still serving afterwards
    assert_eq!(server.get_app("/hello").await?.status(), 200);

    server.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_shutdown_closes_listeners() -> TestResult {
    let server = TestServer::start().await?;
    let app_url = server.app_url("/hello");
    let client = server.client.clone();

    assert_eq!(client.get(&app_url).send().await?.status(), 200);
    server.stop().await??;

    let result = tokio::time::timeout(Duration::from_secs(5), client.get(&app_url).send()).await?;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_trace_headers_on_app_and_ops() -> TestResult {
    let server = TestServer::start().await?;

    let response = server.get_app("/users/42").await?;
    assert_eq!(response.status(), 200);
    let trace_id = response.headers()["x-trace-id"].to_str()?.to_string();
    assert_eq!(trace_id.len(), 32);
    assert_eq!(response.headers()["x-sampled"], "1");

    let response = server
        .client
        .get(server.ops_url("/info"))
        .header(
            "traceparent",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-00",
        )
        .send()
        .await?;
    assert_eq!(
        response.headers()["x-trace-id"],
        "4bf92f3577b34da6a3ce929d0e0e4736"
    );
    assert_eq!(response.headers()["x-sampled"], "0");

    server.stop().await??;
    Ok(())
}

/// `X-Api-Key: <user>[:<role>]`, with "unavailable" failing authentication
struct ApiKeyAuthenticator;

#[async_trait]
impl HttpAuthenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, parts: &Parts) -> Result<Principal, AuthError> {
        match parts.headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
            None => Ok(Principal::anonymous()),
            Some("unavailable") => Err(AuthError::new("key store unavailable")),
            Some(key) => {
                let (user, role) = key.split_once(':').unwrap_or((key, ""));
                Ok(Principal::authenticated(user, user).with_role(role))
            }
        }
    }
}

async fn start_authenticated() -> TestResult<TestServer> {
    let router = test_router()
        .merge(
            Router::new()
                .route(
                    "/me",
                    get(|Extension(principal): Extension<Principal>| async move {
                        principal.name().to_string()
                    }),
                )
                .layer(axum::middleware::from_fn(require_authenticated)),
        )
        .merge(
            Router::new()
                .route("/admin", get(|| async { "admin" }))
                .layer(axum::middleware::from_fn_with_state(
                    RequiredRole::new("admin"),
                    require_role,
                )),
        );

    let server = Server::new(test_config(), router)?.with_authenticator(ApiKeyAuthenticator);
    TestServer::from_server(server).await
}

#[tokio::test]
async fn test_authentication_outcomes() -> TestResult {
    let server = start_authenticated().await?;
    let call = |path: &str, key: Option<&str>| {
        let mut request = server.client.get(server.app_url(path));
        if let Some(key) = key {
            request = request.header("X-Api-Key", key);
        }
        request.send()
    };

    // unguarded routes still serve anonymous callers
    assert_eq!(call("/hello", None).await?.status(), 200);

    let response = call("/me", None).await?;
    assert_eq!(response.status(), 401);
    assert_eq!(response.headers()["content-type"], PROBLEM_JSON);
    assert_eq!(response.json::<Value>().await?["title"], "Unauthorized");

    let response = call("/me", Some("ada:reader")).await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "ada");

    let response = call("/admin", Some("ada:reader")).await?;
    assert_eq!(response.status(), 403);
    assert_eq!(response.json::<Value>().await?["title"], "Forbidden");

    assert_eq!(call("/admin", Some("grace:admin")).await?.status(), 200);

    let response = call("/hello", Some("unavailable")).await?;
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await?;
    assert_eq!(body["title"], "Internal Server Error");
    assert!(body["requestId"].is_string());

    server.stop().await??;
    Ok(())
}
