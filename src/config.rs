//! # Server Configuration
//!
//! Layered configuration for the application and operations listeners.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults ([`ServerConfig::default`])
//! 2. A TOML file: the path in `SERVICEKIT_CONFIG`, else `./servicekit.toml` if present
//! 3. Environment variables prefixed `SERVICEKIT_` (e.g. `SERVICEKIT_HTTP_PORT=9000`,
//!    `SERVICEKIT_REQUEST_DURATION_BUCKETS=0.1,0.5,1`)

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, ServiceKitError};
use crate::metrics::DEFAULT_REQUEST_DURATION_BUCKETS;

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "SERVICEKIT_CONFIG";

const ENV_PREFIX: &str = "SERVICEKIT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address both listeners bind to
    pub bind_address: String,

    /// Application listener port
    pub http_port: u16,

    /// Operations listener port (metrics, health, info)
    pub ops_port: u16,

    /// Per-request timeout on the application listener, 0 disables it
    pub request_timeout_ms: u64,

    /// Expose `/metrics` on the operations listener
    pub metrics_enabled: bool,

    /// Expose liveness and readiness on the operations listener
    pub health_enabled: bool,

    /// Prefix for the health routes (`{base}/live`, `{base}/ready`)
    pub health_base_path: String,

    /// Outer deadline for a readiness evaluation, 0 means none
    pub readiness_timeout_ms: u64,

    /// Timeout applied to checks registered without one
    pub default_check_timeout_ms: u64,

    /// Histogram buckets (seconds) for request latency
    pub request_duration_buckets: Vec<f64>,

    /// How long shutdown waits for in-flight requests
    pub shutdown_grace_period_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: 8080,
            ops_port: 8082,
            request_timeout_ms: 0,
            metrics_enabled: false,
            health_enabled: false,
            health_base_path: "/healthz".to_string(),
            readiness_timeout_ms: 0,
            default_check_timeout_ms: 1000,
            request_duration_buckets: DEFAULT_REQUEST_DURATION_BUCKETS.to_vec(),
            shutdown_grace_period_ms: 30_000,
        }
    }
}

impl ServerConfig {
    /// Load from the default file location and the process environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_from(path)
    }

    /// Load from an explicit file (required when given) and the process environment.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Load with an explicit environment map instead of the process environment.
    ///
    /// Keys in `env` are full variable names, e.g. `SERVICEKIT_OPS_PORT`.
    pub fn load_with_env(
        path: Option<PathBuf>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder();

        builder = match &path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration file");
                builder.add_source(File::from(path.clone()).required(true))
            }
            None => builder.add_source(File::with_name("servicekit").required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("request_duration_buckets")
                .source(env),
        );

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            http_port = config.http_port,
            ops_port = config.ops_port,
            metrics_enabled = config.metrics_enabled,
            health_enabled = config.health_enabled,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.http_port != 0 && self.http_port == self.ops_port {
            return Err(ServiceKitError::Configuration(format!(
                "http_port and ops_port must differ (both {})",
                self.http_port
            )));
        }

        if !self.health_base_path.starts_with('/') || self.health_base_path.len() < 2 {
            return Err(ServiceKitError::Configuration(format!(
                "health_base_path must start with '/' and name a path, got '{}'",
                self.health_base_path
            )));
        }

        if self.health_base_path.ends_with('/') {
            return Err(ServiceKitError::Configuration(format!(
                "health_base_path must not end with '/', got '{}'",
                self.health_base_path
            )));
        }

        if self.request_duration_buckets.is_empty() {
            return Err(ServiceKitError::Configuration(
                "request_duration_buckets must not be empty".to_string(),
            ));
        }

        if self
            .request_duration_buckets
            .windows(2)
            .any(|pair| pair[0] >= pair[1])
        {
            return Err(ServiceKitError::Configuration(
                "request_duration_buckets must be strictly increasing".to_string(),
            ));
        }

        Ok(())
    }

    pub fn app_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.http_port)
    }

    pub fn ops_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.ops_port)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.request_timeout_ms)
    }

    pub fn readiness_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.readiness_timeout_ms)
    }

    pub fn default_check_timeout(&self) -> Duration {
        Duration::from_millis(self.default_check_timeout_ms)
    }

    pub fn shutdown_grace_period(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_period_ms)
    }

    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn with_ops_port(mut self, port: u16) -> Self {
        self.ops_port = port;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_metrics(mut self) -> Self {
        self.metrics_enabled = true;
        self
    }

    pub fn with_health_checks(mut self) -> Self {
        self.health_enabled = true;
        self
    }

    pub fn with_health_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.health_base_path = base_path.into();
        self
    }

    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_request_duration_buckets(mut self, buckets: Vec<f64>) -> Self {
        self.request_duration_buckets = buckets;
        self
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
