//! # Health Report
//!
//! Per-evaluation results and the precedence rule that reduces them to one
//! overall status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::status::HealthStatus;

/// Outcome of one check within one evaluation
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub name: String,
    pub critical: bool,
    pub status: HealthStatus,
    pub tags: Vec<String>,
    pub duration: Duration,
}

/// Component entry as rendered in a readiness response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub tags: Vec<String>,
}

impl From<CheckOutcome> for ComponentHealth {
    fn from(outcome: CheckOutcome) -> Self {
        Self {
            name: outcome.name,
            status: outcome.status,
            tags: outcome.tags,
        }
    }
}

/// Aggregate result of a readiness evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Build a report from outcomes, folding their statuses.
    ///
    /// Components keep the order of `outcomes`.
    pub fn from_outcomes(outcomes: Vec<CheckOutcome>) -> Self {
        let status = Self::overall_of(outcomes.iter().map(|o| (o.status, o.critical)));

        Self {
            status,
            components: outcomes.into_iter().map(ComponentHealth::from).collect(),
            timestamp: Utc::now(),
        }
    }

    /// Overall status for a set of `(status, critical)` results.
    pub fn overall_of<I>(results: I) -> HealthStatus
    where
        I: IntoIterator<Item = (HealthStatus, bool)>,
    {
        results
            .into_iter()
            .fold(HealthStatus::Up, |overall, (status, critical)| {
                fold_status(overall, status, critical)
            })
    }
}

/// Apply one result to the running overall status.
///
/// Down only comes from a critical component, and nothing upgrades a status
/// once it has been lowered.
pub fn fold_status(overall: HealthStatus, status: HealthStatus, critical: bool) -> HealthStatus {
    match status {
        HealthStatus::Up => overall,
        HealthStatus::Degraded => overall.max(HealthStatus::Degraded),
        HealthStatus::Down if critical => HealthStatus::Down,
        HealthStatus::Down => overall.max(HealthStatus::Degraded),
    }
}
