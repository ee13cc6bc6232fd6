//! # Structured Logging Module
//!
//! Environment-aware `tracing` setup with a runtime-adjustable level.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the deployment
//! environment (`SERVICEKIT_ENV`, then `APP_ENV`): `production` logs at
//! `info`, everything else at `debug`. Output is JSON in production or when
//! `SERVICEKIT_LOG_FORMAT=json`.

use std::io::IsTerminal;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::error::{Result, ServiceKitError};

static LOG_HANDLE: OnceLock<LogLevelHandle> = OnceLock::new();

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Handle for changing the global log level at runtime
#[derive(Clone)]
pub struct LogLevelHandle {
    reload: Option<FilterHandle>,
    current: Arc<RwLock<String>>,
}

impl std::fmt::Debug for LogLevelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogLevelHandle")
            .field("attached", &self.reload.is_some())
            .field("current", &*self.current.read())
            .finish()
    }
}

impl LogLevelHandle {
    /// Wrap a reload handle for a filter currently set to `initial`.
    pub fn attached(handle: FilterHandle, initial: impl Into<String>) -> Self {
        Self {
            reload: Some(handle),
            current: Arc::new(RwLock::new(initial.into())),
        }
    }

    /// A handle with no subscriber behind it; level changes are recorded only.
    pub fn detached(initial: impl Into<String>) -> Self {
        Self {
            reload: None,
            current: Arc::new(RwLock::new(initial.into())),
        }
    }

    /// The filter directive most recently applied.
    pub fn current(&self) -> String {
        self.current.read().clone()
    }

    /// Replace the active filter with `level`.
    pub fn set_level(&self, level: &str) -> Result<()> {
        let level = parse_level(level)?;
        let directive = level.to_string().to_lowercase();

        if let Some(handle) = &self.reload {
            handle
                .reload(EnvFilter::new(&directive))
                .map_err(|e| ServiceKitError::Logging(format!("failed to reload filter: {e}")))?;
        }

        *self.current.write() = directive.clone();
        tracing::info!(level = %directive, "Log level changed");
        Ok(())
    }
}

/// Parse a level name the way operators type it.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        "off" => Ok(LevelFilter::OFF),
        other => Err(ServiceKitError::InvalidLogLevel(other.to_string())),
    }
}

/// Initialize the global subscriber once and return the level handle.
///
/// Later calls return the same handle. If another global subscriber was
/// installed first, the returned handle is detached.
pub fn init_tracing() -> LogLevelHandle {
    LOG_HANDLE
        .get_or_init(|| {
            let environment = get_environment();
            let directive =
                std::env::var("RUST_LOG").unwrap_or_else(|_| get_log_level(&environment).to_string());
            let json = use_json_output(&environment);

            let (filter, handle) = reload::Layer::new(EnvFilter::new(&directive));

            let json_layer = json.then(|| {
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
            });
            let text_layer = (!json).then(|| {
                fmt::layer()
                    .with_target(true)
                    .with_ansi(std::io::stdout().is_terminal())
            });

            let installed = tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .with(text_layer)
                .try_init()
                .is_ok();

            if installed {
                tracing::info!(
                    environment = %environment,
                    filter = %directive,
                    json,
                    "Logging initialized"
                );
                LogLevelHandle::attached(handle, directive)
            } else {
                tracing::debug!("Global tracing subscriber already initialized");
                LogLevelHandle::detached(directive)
            }
        })
        .clone()
}

/// The handle created by [`init_tracing`], if it has run.
pub fn global_handle() -> Option<LogLevelHandle> {
    LOG_HANDLE.get().cloned()
}

/// Current deployment environment name
pub fn get_environment() -> String {
    std::env::var("SERVICEKIT_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn use_json_output(environment: &str) -> bool {
    let requested = std::env::var("SERVICEKIT_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    requested || environment == "production"
}
