//! # Operations Handlers
//!
//! Service identity, uptime, Prometheus exposition, and runtime log level.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::metrics;
use crate::web::errors::ApiError;
use crate::web::state::{OpsState, ServiceInfo};

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    #[serde(flatten)]
    pub service: ServiceInfo,
    pub servicekit_version: &'static str,
    pub features: EnabledFeatures,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct EnabledFeatures {
    pub metrics: bool,
    pub health: bool,
    pub health_base_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UptimeResponse {
    pub uptime: String,
    pub uptime_seconds: u64,
    pub start: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LogLevelRequest {
    pub level: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogLevelResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Service information: GET /info
pub async fn info(State(state): State<OpsState>) -> Json<InfoResponse> {
    let config = &state.config;
    Json(InfoResponse {
        service: state.service.clone(),
        servicekit_version: env!("CARGO_PKG_VERSION"),
        features: EnabledFeatures {
            metrics: config.metrics_enabled,
            health: config.health_enabled,
            health_base_path: config
                .health_enabled
                .then(|| config.health_base_path.clone()),
        },
        started_at: state.started_at,
    })
}

/// Process uptime: GET /uptime
pub async fn uptime(State(state): State<OpsState>) -> Json<UptimeResponse> {
    let uptime = state.uptime();
    Json(UptimeResponse {
        uptime: format_uptime(uptime),
        uptime_seconds: uptime.as_secs(),
        start: state.started_at,
    })
}

/// Prometheus text exposition: GET /metrics
pub async fn metrics(State(state): State<OpsState>) -> Result<Response, ApiError> {
    let body = metrics::encode(&state.registry)?;
    Ok((
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
        )],
        body,
    )
        .into_response())
}

/// Change the global log level: PUT /log/level
pub async fn set_log_level(
    State(state): State<OpsState>,
    payload: Result<Json<LogLevelRequest>, JsonRejection>,
) -> (StatusCode, Json<LogLevelResponse>) {
    let result = payload
        .map_err(|rejection| rejection.body_text())
        .and_then(|Json(request)| {
            state
                .log_level
                .set_level(&request.level)
                .map_err(|e| e.to_string())
        });

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(LogLevelResponse {
                success: true,
                error: None,
            }),
        ),
        Err(error) => {
            warn!(error = %error, "Rejected log level change");
            (
                StatusCode::BAD_REQUEST,
                Json(LogLevelResponse {
                    success: false,
                    error: Some(error),
                }),
            )
        }
    }
}

/// Render a duration as hours, minutes, and seconds, e.g. `26h3m7s`.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
