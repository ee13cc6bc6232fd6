//! # Check Context
//!
//! Deadline and cancellation carried into every health check invocation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Cancellable, deadline-bearing context handed to a [`HealthChecker`].
///
/// A context is finished once its token is cancelled or its deadline
/// passes. Children derived with [`CheckContext::child`] never outlive their
/// parent: their deadline is capped by the parent's and cancelling the parent
/// cancels every child.
///
/// [`HealthChecker`]: super::HealthChecker
#[derive(Debug, Clone)]
pub struct CheckContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Default for CheckContext {
    fn default() -> Self {
        Self::background()
    }
}

impl CheckContext {
    /// Context without a deadline; only finished by [`CheckContext::cancel`]
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// Context finishing after `timeout`. A timeout too large to represent
    /// as an instant yields a background context.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::background(),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: CancellationToken::new(),
        }
    }

    /// Derive a child whose deadline is `min(parent deadline, now + timeout)`.
    ///
    /// When `now + timeout` overflows the child keeps the parent's deadline.
    pub fn child(&self, timeout: Duration) -> Self {
        let deadline = match Instant::now().checked_add(timeout) {
            Some(local) => Some(self.deadline.map_or(local, |parent| parent.min(local))),
            None => self.deadline,
        };

        Self {
            deadline,
            token: self.token.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancelled or past the deadline
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Cancel this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Guard that cancels this context when dropped.
    ///
    /// Used by request handlers so that an abandoned request cancels the
    /// checks it started.
    pub fn drop_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    /// Resolves once the context is cancelled or its deadline elapses.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Race `fut` against [`CheckContext::done`].
    ///
    /// Returns `None` when the context finished first; the future is dropped.
    pub async fn run<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            output = fut => Some(output),
            _ = self.done() => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_child_deadline_is_capped_by_parent() {
        let parent = CheckContext::with_timeout(Duration::from_millis(100));
        let child = parent.child(Duration::from_secs(5));
        assert_eq!(child.deadline(), parent.deadline());

        let short = parent.child(Duration::from_millis(10));
        assert!(short.deadline().unwrap() < parent.deadline().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_child_uses_own_timeout() {
        let parent = CheckContext::background();
        assert!(parent.deadline().is_none());
        assert!(parent.remaining().is_none());

        let child = parent.child(Duration::from_millis(250));
        assert_eq!(child.remaining(), Some(Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_keeps_parent_deadline() {
        let background = CheckContext::background();
        let child = background.child(Duration::MAX);
        assert!(child.deadline().is_none());
        assert!(!child.is_done());

        let bounded = CheckContext::with_timeout(Duration::from_secs(5));
        let child = bounded.child(Duration::MAX);
        assert_eq!(child.deadline(), bounded.deadline());

        let ctx = CheckContext::with_timeout(Duration::MAX);
        assert!(ctx.deadline().is_none());
        assert_eq!(ctx.run(async { 3 }).await, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_fires_at_deadline() {
        let ctx = CheckContext::with_timeout(Duration::from_millis(50));
        assert!(!ctx.is_done());

        let start = Instant::now();
        ctx.done().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(ctx.is_done());
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_parent_cancel_reaches_child() {
        let parent = CheckContext::background();
        let child = parent.child(Duration::from_secs(60));

        parent.cancel();
        child.done().await;
        assert!(child.is_cancelled());
        assert!(child.is_done());
    }

    #[test]
    fn test_background_done_pending_until_cancel() {
        let ctx = CheckContext::background();
        let waiter = ctx.clone();
        let mut done = tokio_test::task::spawn(async move { waiter.done().await });

        tokio_test::assert_pending!(done.poll());
        ctx.cancel();
        assert!(done.is_woken());
        tokio_test::assert_ready!(done.poll());
    }

    #[tokio::test]
    async fn test_drop_guard_cancels() {
        let ctx = CheckContext::background();
        let child = ctx.child(Duration::from_secs(60));
        {
            let _guard = ctx.drop_guard();
        }
        assert!(child.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_none_after_deadline() {
        let ctx = CheckContext::with_timeout(Duration::from_millis(20));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_millis(200)))
            .await;
        assert!(result.is_none());

        let ctx = CheckContext::with_timeout(Duration::from_millis(200));
        let result = ctx.run(async { 7 }).await;
        assert_eq!(result, Some(7));
    }
}
