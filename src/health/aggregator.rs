//! # Health Aggregator
//!
//! Fans out every registered component check onto its own task, waits for
//! all of them, and folds the results into a single [`HealthReport`].
//!
//! ```text
//!            evaluate(ctx)
//!                 │ snapshot registrations
//!     ┌───────────┼───────────┐
//!     ▼           ▼           ▼
//!  task(db)   task(cache)  task(queue)     child ctx: min(ctx deadline, now + timeout)
//!     │           │           │            panic => DOWN
//!     └───────────┼───────────┘
//!                 ▼ wait for all (completion order)
//!           fold => HealthReport
//! ```

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::check::{ComponentRegistration, DEFAULT_CHECK_TIMEOUT};
use super::context::CheckContext;
use super::report::{CheckOutcome, HealthReport};
use super::status::HealthStatus;
use crate::metrics::HealthCheckMetrics;

/// Registry and evaluator of component health checks.
///
/// Owned by the host (usually through [`Server`](crate::server::Server)) and
/// shared behind an `Arc` with the readiness handler. Registration is
/// append-only; each evaluation works on a snapshot taken when it starts, so
/// registering while an evaluation is in flight is safe but only affects
/// later evaluations.
pub struct HealthAggregator {
    components: RwLock<Vec<Arc<ComponentRegistration>>>,
    default_timeout: Duration,
    metrics: Option<HealthCheckMetrics>,
}

impl std::fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthAggregator")
            .field("components", &self.len())
            .field("default_timeout", &self.default_timeout)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self::with_default_timeout(DEFAULT_CHECK_TIMEOUT)
    }

    /// Aggregator substituting `default_timeout` for registrations without one.
    ///
    /// A zero `default_timeout` falls back to [`DEFAULT_CHECK_TIMEOUT`].
    pub fn with_default_timeout(default_timeout: Duration) -> Self {
        let default_timeout = if default_timeout.is_zero() {
            DEFAULT_CHECK_TIMEOUT
        } else {
            default_timeout
        };

        Self {
            components: RwLock::new(Vec::new()),
            default_timeout,
            metrics: None,
        }
    }

    /// Record per-check durations into `metrics`.
    pub fn with_metrics(mut self, metrics: HealthCheckMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Register a component check.
    ///
    /// Never fails. A zero timeout is replaced by the default timeout and
    /// logged at warn level. Duplicate names are kept as separate entries.
    pub fn register(&self, mut registration: ComponentRegistration) {
        if registration.timeout.is_zero() {
            warn!(
                component = %registration.name,
                timeout_ms = self.default_timeout.as_millis() as u64,
                "Health check has no timeout, using default"
            );
            registration.timeout = self.default_timeout;
        }

        debug!(
            component = %registration.name,
            critical = registration.critical,
            timeout_ms = registration.timeout.as_millis() as u64,
            "Registered health check"
        );

        self.components.write().push(Arc::new(registration));
    }

    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.read().is_empty()
    }

    /// Registrations as of now, in registration order
    pub fn registrations(&self) -> Vec<Arc<ComponentRegistration>> {
        self.components.read().clone()
    }

    /// Run every registered check concurrently and fold the results.
    ///
    /// Each check gets a child of `ctx` bounded by its own timeout. The call
    /// returns once every check has returned; a check that ignores its
    /// context delays the result. Component order in the report follows
    /// completion order.
    pub async fn evaluate(&self, ctx: &CheckContext) -> HealthReport {
        let components = self.registrations();
        let started = Instant::now();

        let mut pending: FuturesUnordered<_> = components
            .into_iter()
            .map(|component| {
                let child = ctx.child(component.timeout);
                let handle = tokio::spawn(run_check(Arc::clone(&component), child));
                async move { (component, handle.await) }
            })
            .collect();

        let mut outcomes = Vec::with_capacity(pending.len());
        while let Some((component, joined)) = pending.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    error!(
                        component = %component.name,
                        error = %join_error,
                        "Health check task failed to complete"
                    );
                    CheckOutcome {
                        name: component.name.clone(),
                        critical: component.critical,
                        status: HealthStatus::Down,
                        tags: component.tags.clone(),
                        duration: started.elapsed(),
                    }
                }
            };

            if let Some(metrics) = &self.metrics {
                metrics.observe(&outcome.name, outcome.status, outcome.duration);
            }
            outcomes.push(outcome);
        }

        let report = HealthReport::from_outcomes(outcomes);

        if report.status == HealthStatus::Up {
            debug!(
                components = report.components.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Health evaluation completed"
            );
        } else {
            warn!(
                status = %report.status,
                components = report.components.len(),
                unhealthy = report
                    .components
                    .iter()
                    .filter(|c| c.status != HealthStatus::Up)
                    .count(),
                duration_ms = started.elapsed().as_millis() as u64,
                "System health degraded"
            );
        }

        report
    }
}

/// Invoke one check inside a panic boundary
async fn run_check(component: Arc<ComponentRegistration>, ctx: CheckContext) -> CheckOutcome {
    let started = Instant::now();

    let status = match AssertUnwindSafe(component.checker.check(ctx))
        .catch_unwind()
        .await
    {
        Ok(status) => status,
        Err(panic) => {
            error!(
                component = %component.name,
                critical = component.critical,
                panic_msg = %panic_message(panic.as_ref()),
                "Health check panicked, reporting DOWN"
            );
            HealthStatus::Down
        }
    };

    CheckOutcome {
        name: component.name.clone(),
        critical: component.critical,
        status,
        tags: component.tags.clone(),
        duration: started.elapsed(),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
