//! One mocks server instance.
//!
//! [`MocksServer`] owns every subsystem: options, alerts, the mock, the
//! HTTP server, the files loader and the plugins. Several instances can
//! live in the same process; they share nothing but the metrics registry.

use crate::admin_api::AdminApi;
use crate::alerts::Alerts;
use crate::config::{MocksConfig, Options};
use crate::error::{ConfigError, ServerError};
use crate::files::FilesLoader;
use crate::mock::Mock;
use crate::plugins::{Plugin, Plugins};
use crate::server::HttpServer;
use crate::variant_handlers::{Middleware, Middlewares, VariantHandler, VariantHandlers};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Configures a [`MocksServer`] before it is built
pub struct MocksServerBuilder {
    config: MocksConfig,
    handlers: Vec<Arc<dyn VariantHandler>>,
    middlewares: Middlewares,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl MocksServerBuilder {
    pub fn new(config: MocksConfig) -> Self {
        Self {
            config,
            handlers: Vec::new(),
            middlewares: Middlewares::new(),
            plugins: Vec::new(),
        }
    }

    /// Add a custom variant type. Replaces a built-in one with the same id.
    pub fn variant_handler(mut self, handler: Arc<dyn VariantHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Make `middleware` available to `middleware` variants as `name`
    pub fn middleware(self, name: impl Into<String>, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.insert(name, middleware);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Validate the configuration, create every subsystem and register
    /// plugins.
    pub async fn build(self) -> Result<MocksServer, ConfigError> {
        self.config.validate()?;

        let options = Options::new(&self.config);
        let alerts = Alerts::new();

        let handlers = VariantHandlers::with_defaults(self.middlewares);
        for handler in self.handlers {
            handlers.register(handler);
        }

        let mock = Mock::new(&options, &alerts.collection("mock"), Arc::new(handlers));
        let server = HttpServer::new(Arc::clone(&mock), &options, &alerts);
        let files = FilesLoader::new(&mock, &options, &alerts);

        let admin_api = Arc::new(AdminApi::new());
        let mut all_plugins: Vec<Arc<dyn Plugin>> = vec![admin_api.clone()];
        all_plugins.extend(self.plugins);
        let mut plugins = Plugins::new(all_plugins, &mock, &options, &alerts);
        plugins.register().await;

        Ok(MocksServer {
            options,
            alerts,
            mock,
            server,
            files,
            plugins,
            admin_api,
            started: tokio::sync::Mutex::new(false),
        })
    }
}

pub struct MocksServer {
    options: Arc<Options>,
    alerts: Alerts,
    mock: Arc<Mock>,
    server: Arc<HttpServer>,
    files: Arc<FilesLoader>,
    plugins: Plugins,
    admin_api: Arc<AdminApi>,
    started: tokio::sync::Mutex<bool>,
}

impl MocksServer {
    pub fn builder(config: MocksConfig) -> MocksServerBuilder {
        MocksServerBuilder::new(config)
    }

    /// Load the mocks folder and initialize plugins
    pub async fn init(&self) {
        if let Err(e) = self.files.init().await {
            self.alerts
                .collection("files")
                .set("init", "Error initializing files", Some(&e));
        }
        self.plugins.init().await;
    }

    /// Start the HTTP server, the files watcher and the plugins. Plugins and
    /// the watcher start even if the HTTP server fails to listen. Calling it
    /// again while started only retries the HTTP server.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut started = self.started.lock().await;
        let result = self.server.start().await;
        if !*started {
            self.files.start();
            self.plugins.start().await;
            *started = true;
            info!("Mocks server started");
        }
        result
    }

    /// Stop everything started by [`MocksServer::start`]. Does nothing when
    /// not started.
    pub async fn stop(&self) {
        let mut started = self.started.lock().await;
        if !*started {
            return;
        }
        self.plugins.stop().await;
        self.files.stop();
        self.server.stop().await;
        *started = false;
        info!("Mocks server stopped");
    }

    pub fn mock(&self) -> &Arc<Mock> {
        &self.mock
    }

    pub fn options(&self) -> &Arc<Options> {
        &self.options
    }

    pub fn alerts(&self) -> &Alerts {
        &self.alerts
    }

    pub fn server(&self) -> &Arc<HttpServer> {
        &self.server
    }

    pub fn files(&self) -> &Arc<FilesLoader> {
        &self.files
    }

    /// Mock server address, if running
    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr()
    }

    /// Admin API address, if running
    pub fn admin_api_addr(&self) -> Option<SocketAddr> {
        self.admin_api.local_addr()
    }

    pub fn plugin_ids(&self) -> Vec<String> {
        self.plugins.ids()
    }
}
