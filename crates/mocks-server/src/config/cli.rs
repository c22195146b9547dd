//! Command line flags and environment variables.
//!
//! Flags mirror the dotted option names (`--server.port 3200`). Every flag
//! can also be given through a `MOCKS_*` environment variable; a flag on the
//! command line wins over the variable, and both win over the config file.

use super::{LogLevel, MocksConfig};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default, Clone)]
#[command(name = "mocks-server")]
#[command(author, version, about = "Mock HTTP server driven by route and collection files", long_about = None)]
pub struct CliArgs {
    /// Config file (YAML or JSON). Defaults to mocks.config.{yaml,yml,json} in the working directory
    #[arg(long, env = "MOCKS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Id of the collection to serve
    #[arg(long = "mock.collections.selected", env = "MOCKS_MOCK_COLLECTIONS_SELECTED")]
    pub selected_collection: Option<String>,

    /// Global response delay in milliseconds
    #[arg(long = "mock.routes.delay", env = "MOCKS_MOCK_ROUTES_DELAY")]
    pub delay: Option<u64>,

    #[arg(long = "server.host", env = "MOCKS_SERVER_HOST")]
    pub host: Option<String>,

    #[arg(long = "server.port", env = "MOCKS_SERVER_PORT")]
    pub port: Option<u16>,

    #[arg(long = "server.cors.enabled", env = "MOCKS_SERVER_CORS_ENABLED")]
    pub cors: Option<bool>,

    #[arg(long = "server.https.enabled", env = "MOCKS_SERVER_HTTPS_ENABLED")]
    pub https: Option<bool>,

    #[arg(long = "server.https.cert", env = "MOCKS_SERVER_HTTPS_CERT")]
    pub https_cert: Option<String>,

    #[arg(long = "server.https.key", env = "MOCKS_SERVER_HTTPS_KEY")]
    pub https_key: Option<String>,

    #[arg(long = "files.enabled", env = "MOCKS_FILES_ENABLED")]
    pub files_enabled: Option<bool>,

    /// Folder containing collections and routes
    #[arg(long = "files.path", env = "MOCKS_FILES_PATH")]
    pub files_path: Option<String>,

    #[arg(long = "files.watch", env = "MOCKS_FILES_WATCH")]
    pub files_watch: Option<bool>,

    #[arg(long = "files.scaffold", env = "MOCKS_FILES_SCAFFOLD")]
    pub files_scaffold: Option<bool>,

    #[arg(long = "plugins.adminApi.enabled", env = "MOCKS_PLUGINS_ADMIN_API_ENABLED")]
    pub admin_api_enabled: Option<bool>,

    #[arg(long = "plugins.adminApi.host", env = "MOCKS_PLUGINS_ADMIN_API_HOST")]
    pub admin_api_host: Option<String>,

    #[arg(long = "plugins.adminApi.port", env = "MOCKS_PLUGINS_ADMIN_API_PORT")]
    pub admin_api_port: Option<u16>,

    /// silent, error, warn, info, verbose, debug or silly
    #[arg(long, env = "MOCKS_LOG")]
    pub log: Option<LogLevel>,
}

impl CliArgs {
    /// Overwrite `config` with every flag that was given
    pub fn apply(&self, config: &mut MocksConfig) {
        if let Some(selected) = &self.selected_collection {
            config.mock.collections.selected = Some(selected.clone());
        }
        if let Some(delay) = self.delay {
            config.mock.routes.delay = delay;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(cors) = self.cors {
            config.server.cors.enabled = cors;
        }
        if let Some(https) = self.https {
            config.server.https.enabled = https;
        }
        if let Some(cert) = &self.https_cert {
            config.server.https.cert = Some(cert.clone());
        }
        if let Some(key) = &self.https_key {
            config.server.https.key = Some(key.clone());
        }
        if let Some(enabled) = self.files_enabled {
            config.files.enabled = enabled;
        }
        if let Some(path) = &self.files_path {
            config.files.path = path.clone();
        }
        if let Some(watch) = self.files_watch {
            config.files.watch = watch;
        }
        if let Some(scaffold) = self.files_scaffold {
            config.files.scaffold = scaffold;
        }
        if let Some(enabled) = self.admin_api_enabled {
            config.plugins.admin_api.enabled = enabled;
        }
        if let Some(host) = &self.admin_api_host {
            config.plugins.admin_api.host = host.clone();
        }
        if let Some(port) = self.admin_api_port {
            config.plugins.admin_api.port = port;
        }
        if let Some(log) = self.log {
            config.log = log;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted_flags() {
        let args = CliArgs::try_parse_from([
            "mocks-server",
            "--server.port",
            "3200",
            "--mock.collections.selected",
            "alt",
            "--files.watch",
            "false",
            "--log",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.port, Some(3200));
        assert_eq!(args.selected_collection.as_deref(), Some("alt"));
        assert_eq!(args.files_watch, Some(false));
        assert_eq!(args.log, Some(LogLevel::Debug));
    }

    #[test]
    fn test_apply_only_overrides_given_flags() {
        let mut config = MocksConfig::default();
        config.files.path = "from-file".to_string();

        let args = CliArgs {
            delay: Some(500),
            ..Default::default()
        };
        args.apply(&mut config);

        assert_eq!(config.mock.routes.delay, 500);
        assert_eq!(config.files.path, "from-file");
        assert_eq!(config.server.port, 3100);
    }
}
