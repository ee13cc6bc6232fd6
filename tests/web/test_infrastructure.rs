//! # Web Test Infrastructure
//!
//! Starts a real servicekit server on ephemeral ports and drives it over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use reqwest::Client;
use serde_json::Value;
use servicekit::health::HealthAggregator;
use servicekit::{Server, ServerConfig, ShutdownHandle};
use tokio::task::JoinHandle;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Config with both listeners on ephemeral localhost ports, health and metrics on.
pub fn test_config() -> ServerConfig {
    ServerConfig::default()
        .with_bind_address("127.0.0.1")
        .with_http_port(0)
        .with_ops_port(0)
        .with_health_checks()
        .with_metrics()
}

async fn panics() -> &'static str {
    panic!("handler blew up")
}

/// Application router used unless a test supplies its own
pub fn test_router() -> Router {
    Router::new()
        .route("/hello", get(|| async { "hello" }))
        .route("/users/:id", get(|| async { "user" }))
        .route("/panic", get(panics))
}

/// A running server plus an HTTP client pointed at it
#[derive(Debug)]
pub struct TestServer {
    pub app_addr: SocketAddr,
    pub ops_addr: SocketAddr,
    pub health: Arc<HealthAggregator>,
    pub client: Client,
    shutdown: ShutdownHandle,
    handle: JoinHandle<servicekit::Result<()>>,
}

impl TestServer {
    pub async fn start() -> TestResult<Self> {
        Self::start_with(test_config(), test_router(), |_| {}).await
    }

    /// Start with `setup` run against the server before it binds.
    pub async fn start_with<F>(config: ServerConfig, router: Router, setup: F) -> TestResult<Self>
    where
        F: FnOnce(&Server),
    {
        let server = Server::new(config, router)?;
        setup(&server);
        Self::from_server(server).await
    }

    /// Bind and serve an already configured server.
    pub async fn from_server(server: Server) -> TestResult<Self> {
        let health = server.health();

        let bound = server.bind().await?;
        let app_addr = bound.app_addr()?;
        let ops_addr = bound.ops_addr()?;
        let shutdown = bound.shutdown_handle();
        let handle = tokio::spawn(bound.serve());

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            app_addr,
            ops_addr,
            health,
            client,
            shutdown,
            handle,
        })
    }

    pub fn app_url(&self, path: &str) -> String {
        format!("http://{}{}", self.app_addr, path)
    }

    pub fn ops_url(&self, path: &str) -> String {
        format!("http://{}{}", self.ops_addr, path)
    }

    pub async fn get_app(&self, path: &str) -> TestResult<reqwest::Response> {
        Ok(self.client.get(self.app_url(path)).send().await?)
    }

    pub async fn get_ops(&self, path: &str) -> TestResult<reqwest::Response> {
        Ok(self.client.get(self.ops_url(path)).send().await?)
    }

    pub async fn put_ops_json(&self, path: &str, body: &Value) -> TestResult<reqwest::Response> {
        Ok(self.client.put(self.ops_url(path)).json(body).send().await?)
    }

    /// Shut down and return what `serve` returned.
    pub async fn stop(self) -> TestResult<servicekit::Result<()>> {
        self.shutdown.shutdown(Duration::from_secs(2));
        let result = tokio::time::timeout(Duration::from_secs(5), self.handle).await??;
        Ok(result)
    }
}
