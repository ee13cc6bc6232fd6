//! # Health Module
//!
//! Aggregate health checking for liveness and readiness endpoints.
//!
//! ## Architecture
//!
//! ```text
//!   host wiring ──register──▶ HealthAggregator ◀──evaluate── readiness handler
//!                                   │
//!                  one task per ComponentRegistration
//!                                   │
//!                                   ▼
//!                             HealthReport
//! ```
//!
//! A component is either critical or not. The overall status starts `UP`;
//! any `DEGRADED` result, or a non-critical `DOWN`, lowers it to `DEGRADED`;
//! a critical `DOWN` lowers it to `DOWN`. Nothing raises it again within an
//! evaluation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use servicekit::health::{check_fn, CheckContext, ComponentRegistration, HealthAggregator, HealthStatus};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let aggregator = HealthAggregator::new();
//! aggregator.register(
//!     ComponentRegistration::new("postgres", check_fn(|_ctx| async { HealthStatus::Up }))
//!         .critical(true)
//!         .with_tags(["database"])
//!         .with_timeout(Duration::from_millis(500)),
//! );
//!
//! let report = aggregator.evaluate(&CheckContext::with_timeout(Duration::from_secs(2))).await;
//! println!("{}", report.status);
//! # }
//! ```

pub mod aggregator;
pub mod check;
pub mod context;
pub mod report;
pub mod status;

pub use aggregator::HealthAggregator;
pub use check::{check_fn, CheckFn, ComponentRegistration, HealthChecker, DEFAULT_CHECK_TIMEOUT};
pub use context::CheckContext;
pub use report::{fold_status, CheckOutcome, ComponentHealth, HealthReport};
pub use status::HealthStatus;
