//! Configuration for the mocks server.
//!
//! [`MocksConfig`] is the serializable option tree read from config files,
//! environment variables and CLI flags. At runtime it is turned into
//! [`Options`], where every tunable is a [`ConfigOption`] other subsystems
//! subscribe to.

mod cli;
mod log;
mod option;
mod options;
mod server;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub use cli::CliArgs;
pub use log::LogLevel;
pub use option::ConfigOption;
pub use options::{AdminApiOptions, FilesOptions, MockOptions, Options, ServerOptions};
pub use server::{AdminApiConfig, CorsConfig, HttpsConfig, ServerConfig};

/// File names looked up in the working directory when no config path is given
pub const CONFIG_FILE_NAMES: [&str; 3] = ["mocks.config.yaml", "mocks.config.yml", "mocks.config.json"];

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionsConfig {
    /// Id of the collection to serve
    pub selected: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutesConfig {
    /// Global response delay in milliseconds
    pub delay: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MockConfig {
    pub collections: CollectionsConfig,
    pub routes: RoutesConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilesConfig {
    pub enabled: bool,
    /// Folder containing `collections.*` and `routes/`
    pub path: String,
    pub watch: bool,
    /// Create an example mocks folder when `path` does not exist
    pub scaffold: bool,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "mocks".to_string(),
            watch: true,
            scaffold: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginsConfig {
    pub admin_api: AdminApiConfig,
    /// Free-form sections for other plugins, keyed by plugin id
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MocksConfig {
    pub mock: MockConfig,
    pub server: ServerConfig,
    pub files: FilesConfig,
    pub plugins: PluginsConfig,
    pub log: LogLevel,
}

impl MocksConfig {
    /// Read a YAML or JSON config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            ConfigError::Read {
                path: path_str.clone(),
                source,
            }
        })?;
        let config: MocksConfig =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path_str,
                source,
            })?;
        Ok(config)
    }

    /// First existing default config file in `dir`
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let https = &self.server.https;
        if https.enabled && (https.cert.is_none() || https.key.is_none()) {
            return Err(ConfigError::Invalid(
                "server.https.cert and server.https.key are required when server.https.enabled is true"
                    .to_string(),
            ));
        }

        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host can not be empty".to_string()));
        }

        if self.files.path.trim().is_empty() {
            return Err(ConfigError::Invalid("files.path can not be empty".to_string()));
        }

        if let Some(selected) = &self.mock.collections.selected {
            if selected.is_empty() {
                return Err(ConfigError::Invalid(
                    "mock.collections.selected can not be an empty string".to_string(),
                ));
            }
        }

        Ok(())
    }
}
