//! Error types surfaced to callers.
//!
//! Problems in mock data are never errors: they become alerts. These types
//! cover caller-driven failures (an unknown id passed to the API) and
//! infrastructure failures (a listener that cannot bind).

use std::net::SocketAddr;

/// Errors returned by the mock's public operations
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("Route variant with id \"{0}\" was not found")]
    RouteVariantNotFound(String),
    #[error("Collection with id \"{0}\" was not found")]
    CollectionNotFound(String),
}

/// Errors starting the HTTP listeners
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),
    #[error("Failed to bind {0}: {1}")]
    Bind(SocketAddr, std::io::Error),
    #[error("HTTPS is enabled but {0} is not configured")]
    MissingTlsFile(&'static str),
    #[error("Invalid TLS configuration: {0}")]
    Tls(String),
    #[error("Listener error: {0}")]
    Listener(#[from] std::io::Error),
}

/// Errors loading or patching configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
