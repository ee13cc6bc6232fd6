//! Error types for servicekit.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceKitError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Failed to bind {listener} listener on {address}: {source}")]
    Bind {
        listener: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{listener} HTTP server: {source}")]
    Server {
        listener: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid health status: {0}")]
    InvalidHealthStatus(String),
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
    #[error("Logging error: {0}")]
    Logging(String),
    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl From<config::ConfigError> for ServiceKitError {
    fn from(error: config::ConfigError) -> Self {
        ServiceKitError::Configuration(error.to_string())
    }
}

impl From<prometheus::Error> for ServiceKitError {
    fn from(error: prometheus::Error) -> Self {
        ServiceKitError::Metrics(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServiceKitError>;
