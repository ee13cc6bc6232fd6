//! # Component Checks
//!
//! The checker contract and the registration record the aggregator owns.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::context::CheckContext;
use super::status::HealthStatus;

/// Timeout substituted when a component is registered without one
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(1);

/// A health check for a single dependency.
///
/// Implementations are expected to observe `ctx` and return promptly once it
/// is done, typically with [`HealthStatus::Down`]. The aggregator never
/// aborts a check on its behalf.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn check(&self, ctx: CheckContext) -> HealthStatus;
}

/// Adapter turning an async closure into a [`HealthChecker`].
pub struct CheckFn<F> {
    f: F,
}

/// Wrap `f` as a [`HealthChecker`].
///
/// ```rust,no_run
/// use servicekit::health::{check_fn, CheckContext, HealthStatus};
///
/// let checker = check_fn(|ctx: CheckContext| async move {
///     match ctx.run(async { /* ping the dependency */ }).await {
///         Some(()) => HealthStatus::Up,
///         None => HealthStatus::Down,
///     }
/// });
/// ```
pub fn check_fn<F, Fut>(f: F) -> CheckFn<F>
where
    F: Fn(CheckContext) -> Fut + Send + Sync,
    Fut: Future<Output = HealthStatus> + Send,
{
    CheckFn { f }
}

#[async_trait]
impl<F, Fut> HealthChecker for CheckFn<F>
where
    F: Fn(CheckContext) -> Fut + Send + Sync,
    Fut: Future<Output = HealthStatus> + Send,
{
    async fn check(&self, ctx: CheckContext) -> HealthStatus {
        (self.f)(ctx).await
    }
}

/// A component check as registered with the aggregator.
///
/// Names are not required to be unique; registering the same name twice
/// yields two entries in every report.
#[derive(Clone)]
pub struct ComponentRegistration {
    pub name: String,
    /// A critical component being down takes the whole system down
    pub critical: bool,
    pub checker: Arc<dyn HealthChecker>,
    pub tags: Vec<String>,
    /// Zero means "use the default" and is replaced at registration
    pub timeout: Duration,
}

impl fmt::Debug for ComponentRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistration")
            .field("name", &self.name)
            .field("critical", &self.critical)
            .field("tags", &self.tags)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ComponentRegistration {
    /// Non-critical registration with no tags and no timeout set
    pub fn new(name: impl Into<String>, checker: impl HealthChecker + 'static) -> Self {
        Self::from_arc(name, Arc::new(checker))
    }

    pub fn from_arc(name: impl Into<String>, checker: Arc<dyn HealthChecker>) -> Self {
        Self {
            name: name.into(),
            critical: false,
            checker,
            tags: Vec::new(),
            timeout: Duration::ZERO,
        }
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
