//! # Web State
//!
//! Shared state for the operations listener.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use prometheus::Registry;
use serde::Serialize;

use crate::config::ServerConfig;
use crate::health::HealthAggregator;
use crate::logging::LogLevelHandle;

/// Identity reported by `GET /info`
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// State shared by the operations handlers
#[derive(Clone)]
pub struct OpsState {
    pub config: Arc<ServerConfig>,
    pub health: Arc<HealthAggregator>,
    pub registry: Registry,
    pub log_level: LogLevelHandle,
    pub service: ServiceInfo,
    pub started_at: DateTime<Utc>,
    started: Instant,
}

impl OpsState {
    pub fn new(
        config: Arc<ServerConfig>,
        health: Arc<HealthAggregator>,
        registry: Registry,
        log_level: LogLevelHandle,
        service: ServiceInfo,
    ) -> Self {
        Self {
            config,
            health,
            registry,
            log_level,
            service,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn readiness_timeout(&self) -> Option<Duration> {
        self.config.readiness_timeout()
    }
}

impl std::fmt::Debug for OpsState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsState")
            .field("service", &self.service)
            .field("components", &self.health.len())
            .field("started_at", &self.started_at)
            .finish()
    }
}
