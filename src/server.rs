//! # Server Lifecycle
//!
//! Runs the host's application router and the operations router on separate
//! listeners and stops them together.
//!
//! ```text
//!  Server::new ──▶ register_health_check ... ──▶ bind ──▶ BoundServer::serve
//!                                                              │
//!        ShutdownHandle::shutdown(grace) ──cancel──▶ drain both listeners
//!                                                   abort after `grace`
//! ```
//!
//! If either listener fails the other is told to stop and the error is
//! returned from `serve`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use parking_lot::Mutex;
use prometheus::Registry;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServiceKitError};
use crate::health::{ComponentRegistration, HealthAggregator};
use crate::logging::{self, LogLevelHandle};
use crate::metrics::{HealthCheckMetrics, HttpMetrics};
use crate::web::middleware::auth::HttpAuthenticator;
use crate::web::{self, state::OpsState, state::ServiceInfo};

const APP_LISTENER: &str = "application";
const OPS_LISTENER: &str = "operations";

/// Triggers a graceful stop of a running server
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
    grace: Arc<Mutex<Duration>>,
}

impl ShutdownHandle {
    /// Stop accepting connections and drain in-flight requests, aborting any
    /// still running after `grace`.
    pub fn shutdown(&self, grace: Duration) {
        *self.grace.lock() = grace;
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    fn grace(&self) -> Duration {
        *self.grace.lock()
    }
}

pub struct Server {
    config: Arc<ServerConfig>,
    router: Router,
    health: Arc<HealthAggregator>,
    registry: Registry,
    http_metrics: Option<HttpMetrics>,
    log_level: LogLevelHandle,
    service: ServiceInfo,
    authenticator: Option<Arc<dyn HttpAuthenticator>>,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Create a server for `router` with validated configuration.
    pub fn new(config: ServerConfig, router: Router) -> Result<Self> {
        config.validate()?;

        let registry = Registry::new();
        let mut health = HealthAggregator::with_default_timeout(config.default_check_timeout());
        let mut http_metrics = None;

        if config.metrics_enabled {
            http_metrics = Some(HttpMetrics::register(
                &registry,
                &config.request_duration_buckets,
            )?);
            health = health.with_metrics(HealthCheckMetrics::register(&registry)?);
        }

        let log_level = logging::global_handle().unwrap_or_else(|| LogLevelHandle::detached("info"));
        let shutdown = ShutdownHandle {
            token: CancellationToken::new(),
            grace: Arc::new(Mutex::new(config.shutdown_grace_period())),
        };

        Ok(Self {
            config: Arc::new(config),
            router,
            health: Arc::new(health),
            registry,
            http_metrics,
            log_level,
            service: ServiceInfo::default(),
            authenticator: None,
            shutdown,
        })
    }

    /// Name and version reported by `GET /info`.
    pub fn with_service_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.service = ServiceInfo {
            name: name.into(),
            version: version.into(),
        };
        self
    }

    /// Authenticate every application request with `authenticator`.
    ///
    /// Handlers read the result as `Extension<Principal>`; routes that need
    /// a caller add `require_authenticated` or `require_role`.
    pub fn with_authenticator<A>(mut self, authenticator: A) -> Self
    where
        A: HttpAuthenticator,
    {
        let authenticator: Arc<dyn HttpAuthenticator> = Arc::new(authenticator);
        self.authenticator = Some(authenticator);
        self
    }

    pub fn with_log_level_handle(mut self, handle: LogLevelHandle) -> Self {
        self.log_level = handle;
        self
    }

    /// Add a component to the readiness evaluation.
    ///
    /// Registration works at any time, including after the server started.
    pub fn register_health_check(&self, registration: ComponentRegistration) {
        if !self.config.health_enabled {
            warn!(
                component = %registration.name,
                "Health checks are disabled; registered check will not be served until health_enabled is set"
            );
        }
        self.health.register(registration);
    }

    pub fn health(&self) -> Arc<HealthAggregator> {
        Arc::clone(&self.health)
    }

    /// Registry exported at `/metrics`; hosts may register their own collectors on it.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Bind both listeners without serving yet.
    pub async fn bind(self) -> Result<BoundServer> {
        let app_listener = bind_listener(APP_LISTENER, self.config.app_addr()).await?;
        let ops_listener = bind_listener(OPS_LISTENER, self.config.ops_addr()).await?;

        let ops_state = OpsState::new(
            Arc::clone(&self.config),
            Arc::clone(&self.health),
            self.registry.clone(),
            self.log_level.clone(),
            self.service.clone(),
        );

        let app = web::create_app(
            self.router,
            self.http_metrics,
            self.config.request_timeout(),
            self.authenticator,
        );
        let ops = web::create_ops_app(ops_state);

        Ok(BoundServer {
            app,
            ops,
            app_listener,
            ops_listener,
            shutdown: self.shutdown,
        })
    }

    /// Bind and serve until shutdown or a listener failure.
    pub async fn start(self) -> Result<()> {
        self.bind().await?.serve().await
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("components", &self.health.len())
            .field("authenticator", &self.authenticator.is_some())
            .finish()
    }
}

/// A server whose listeners are bound
pub struct BoundServer {
    app: Router,
    ops: Router,
    app_listener: TcpListener,
    ops_listener: TcpListener,
    shutdown: ShutdownHandle,
}

impl BoundServer {
    pub fn app_addr(&self) -> Result<SocketAddr> {
        local_addr(APP_LISTENER, &self.app_listener)
    }

    pub fn ops_addr(&self) -> Result<SocketAddr> {
        local_addr(OPS_LISTENER, &self.ops_listener)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serve both listeners until shutdown or a listener failure.
    pub async fn serve(self) -> Result<()> {
        let token = self.shutdown.token.clone();

        info!(address = ?self.ops_listener.local_addr().ok(), "Starting operations HTTP server");
        let mut ops_task = spawn_listener(self.ops_listener, self.ops, token.clone());
        info!(address = ?self.app_listener.local_addr().ok(), "Starting application HTTP server");
        let mut app_task = spawn_listener(self.app_listener, self.app, token.clone());

        let failure = tokio::select! {
            result = &mut app_task => Some((APP_LISTENER, flatten(result))),
            result = &mut ops_task => Some((OPS_LISTENER, flatten(result))),
            _ = token.cancelled() => None,
        };

        if let Some((listener, result)) = failure {
            // one listener stopped on its own; take the other one down too
            token.cancel();
            let source = match result {
                Err(source) => source,
                Ok(()) => std::io::Error::other("listener stopped unexpectedly"),
            };
            error!(listener, error = %source, "HTTP server stopped with error");

            let remaining = if listener == APP_LISTENER { ops_task } else { app_task };
            drain(vec![remaining], self.shutdown.grace()).await;
            return Err(ServiceKitError::Server { listener, source });
        }

        let grace = self.shutdown.grace();
        info!(grace_ms = grace.as_millis() as u64, "Shutting down HTTP servers");
        drain(vec![app_task, ops_task], grace).await;
        info!("HTTP servers stopped");
        Ok(())
    }
}

type ListenerTask = JoinHandle<std::io::Result<()>>;

fn spawn_listener(listener: TcpListener, router: Router, token: CancellationToken) -> ListenerTask {
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(token.cancelled_owned())
            .await
    })
}

fn flatten(result: std::result::Result<std::io::Result<()>, tokio::task::JoinError>) -> std::io::Result<()> {
    result.map_err(std::io::Error::other)?
}

/// Wait for `tasks` to finish draining, aborting whatever remains after `grace`.
async fn drain(tasks: Vec<ListenerTask>, grace: Duration) {
    let aborts: Vec<_> = tasks.iter().map(|task| task.abort_handle()).collect();

    if tokio::time::timeout(grace, futures::future::join_all(tasks))
        .await
        .is_err()
    {
        warn!(
            grace_ms = grace.as_millis() as u64,
            "Grace period elapsed; aborting in-flight requests"
        );
        for abort in aborts {
            abort.abort();
        }
    }
}

async fn bind_listener(listener: &'static str, address: String) -> Result<TcpListener> {
    TcpListener::bind(&address)
        .await
        .map_err(|source| ServiceKitError::Bind {
            listener,
            address,
            source,
        })
}

fn local_addr(listener: &'static str, socket: &TcpListener) -> Result<SocketAddr> {
    socket
        .local_addr()
        .map_err(|source| ServiceKitError::Server { listener, source })
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
