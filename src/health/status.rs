//! # Health Status
//!
//! Closed set of component and system health states.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ServiceKitError;

/// Health of a single component or of the system as a whole.
///
/// Variants are ordered by severity (`Up < Degraded < Down`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// Fully functional
    Up,
    /// Functional with reduced capability
    Degraded,
    /// Not functional
    Down,
}

impl HealthStatus {
    /// HTTP status code the readiness endpoint answers with for this status.
    pub fn status_code(&self) -> StatusCode {
        match self {
            HealthStatus::Up | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Up => "UP",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Down => "DOWN",
        }
    }

    /// Whether traffic can still be served (up or degraded)
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Up | HealthStatus::Degraded)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = ServiceKitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(HealthStatus::Up),
            "DEGRADED" => Ok(HealthStatus::Degraded),
            "DOWN" => Ok(HealthStatus::Down),
            _ => Err(ServiceKitError::InvalidHealthStatus(s.to_string())),
        }
    }
}
