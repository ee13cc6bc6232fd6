//! # Metrics
//!
//! Prometheus instruments for the application listener and the health
//! aggregator, registered on a per-server [`Registry`] that the operations
//! listener exports at `/metrics`.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use crate::error::Result;
use crate::health::HealthStatus;

/// Buckets (seconds) used for request latency unless configured otherwise
pub const DEFAULT_REQUEST_DURATION_BUCKETS: [f64; 7] =
    [0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0];

/// Route label used when a request did not match a route
pub const UNDEFINED_ROUTE: &str = "undefined";

/// HTTP server instruments
#[derive(Clone)]
pub struct HttpMetrics {
    request_duration: HistogramVec,
    in_flight: IntGauge,
}

impl HttpMetrics {
    /// Create the instruments and register them on `registry`.
    pub fn register(registry: &Registry, buckets: &[f64]) -> Result<Self> {
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_server_request_duration_seconds",
                "Duration in seconds for the server to process a request",
            )
            .buckets(buckets.to_vec()),
            &["method", "route", "status"],
        )?;
        let in_flight = IntGauge::with_opts(Opts::new(
            "http_server_requests_in_flight",
            "Number of in-flight requests",
        ))?;

        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;

        Ok(Self {
            request_duration,
            in_flight,
        })
    }

    /// Count a request as in flight until the returned guard is dropped.
    pub fn request_started(&self) -> InFlightGuard {
        self.in_flight.inc();
        InFlightGuard {
            gauge: self.in_flight.clone(),
        }
    }

    pub fn request_finished(&self, method: &str, route: &str, status: u16, elapsed: Duration) {
        let status = status.to_string();
        self.request_duration
            .with_label_values(&[method, route, status.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.get()
    }
}

/// Decrements the in-flight gauge on drop, including when the request
/// future is cancelled before a response is produced.
#[must_use = "the request stops counting as in flight when the guard is dropped"]
#[derive(Debug)]
pub struct InFlightGuard {
    gauge: IntGauge,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

/// Per-component health check instruments
#[derive(Clone)]
pub struct HealthCheckMetrics {
    check_duration: HistogramVec,
}

impl HealthCheckMetrics {
    pub fn register(registry: &Registry) -> Result<Self> {
        let check_duration = HistogramVec::new(
            HistogramOpts::new(
                "health_check_duration_seconds",
                "Duration in seconds of individual component health checks",
            )
            .buckets(DEFAULT_REQUEST_DURATION_BUCKETS.to_vec()),
            &["component", "status"],
        )?;
        registry.register(Box::new(check_duration.clone()))?;

        Ok(Self { check_duration })
    }

    pub fn observe(&self, component: &str, status: HealthStatus, elapsed: Duration) {
        self.check_duration
            .with_label_values(&[component, status.as_str()])
            .observe(elapsed.as_secs_f64());
    }
}

/// Render `registry` in the Prometheus text exposition format.
pub fn encode(registry: &Registry) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| crate::error::ServiceKitError::Metrics(format!("non UTF-8 exposition: {e}")))
}
