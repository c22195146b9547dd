//! Listener configuration: mock server, CORS, HTTPS and the admin API.

use serde::{Deserialize, Serialize};

/// HTTPS configuration for the mock server listener
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpsConfig {
    pub enabled: bool,
    /// Path to the TLS certificate file (PEM format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    /// Path to the TLS private key file (PEM format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorsConfig {
    pub enabled: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    /// Port to listen on. 0 lets the OS pick a free port.
    pub port: u16,
    pub cors: CorsConfig,
    pub https: HttpsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    3100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_server_port(),
            cors: CorsConfig::default(),
            https: HttpsConfig::default(),
        }
    }
}

/// Admin API plugin listener
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

fn default_admin_port() -> u16 {
    3110
}

impl Default for AdminApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_admin_port(),
        }
    }
}
