//! HTTP transport of the mock server.
//!
//! Owns the listener serving the mounted route table. Start, stop and
//! restart are idempotent and serialized; a failure to bind or to load TLS
//! material is reported as the `server:start` alert and leaves the server
//! stopped.

mod handler;
pub mod listener;
pub mod network;
pub mod tls;

pub use handler::{dispatch, handle_request};
pub use listener::{RequestHandler, RunningListener};

use crate::alerts::Alerts;
use crate::config::{ConfigOption, Options, ServerOptions};
use crate::error::ServerError;
use crate::listeners::Subscription;
use crate::mock::Mock;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info};

const START_ALERT: &str = "start";

pub struct HttpServer {
    mock: Arc<Mock>,
    options: ServerOptions,
    alerts: Alerts,
    running: tokio::sync::Mutex<Option<RunningListener>>,
    addr: RwLock<Option<SocketAddr>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

/// Restart the server whenever `option` changes while it is running
fn restart_on_change<T>(option: &ConfigOption<T>, server: Weak<HttpServer>) -> Subscription
where
    T: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static,
{
    let name = option.name();
    option.on_change(move |_| {
        let Some(server) = server.upgrade() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    server.restart_if_running().await;
                });
            }
            Err(_) => debug!(option = name, "No runtime available, server not restarted"),
        }
    })
}

impl HttpServer {
    pub fn new(mock: Arc<Mock>, options: &Options, alerts: &Alerts) -> Arc<Self> {
        let server = Arc::new(Self {
            mock,
            options: options.server.clone(),
            alerts: alerts.collection("server"),
            running: tokio::sync::Mutex::new(None),
            addr: RwLock::new(None),
            subscriptions: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&server);
        let server_options = &server.options;
        *server.subscriptions.lock() = vec![
            restart_on_change(&server_options.host, weak.clone()),
            restart_on_change(&server_options.port, weak.clone()),
            restart_on_change(&server_options.https_enabled, weak.clone()),
            restart_on_change(&server_options.https_cert, weak.clone()),
            restart_on_change(&server_options.https_key, weak),
        ];
        server
    }

    /// Address the server is listening on, if running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.addr.read()
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Start listening. Does nothing when already running.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if let Some(listener) = running.as_ref() {
            return Ok(listener.addr());
        }
        let listener = self.listen().await?;
        let addr = listener.addr();
        *running = Some(listener);
        Ok(addr)
    }

    /// Stop listening. Does nothing when not running.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        if let Some(listener) = running.take() {
            listener.shutdown().await;
            *self.addr.write() = None;
        }
    }

    /// Stop and start again with the current options
    pub async fn restart(&self) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if let Some(listener) = running.take() {
            listener.shutdown().await;
            *self.addr.write() = None;
        }
        let listener = self.listen().await?;
        let addr = listener.addr();
        *running = Some(listener);
        Ok(addr)
    }

    async fn restart_if_running(&self) {
        let mut running = self.running.lock().await;
        let Some(listener) = running.take() else {
            return;
        };
        info!("Server options changed, restarting");
        listener.shutdown().await;
        *self.addr.write() = None;
        // Failures are already reported as an alert
        if let Ok(listener) = self.listen().await {
            *running = Some(listener);
        }
    }

    async fn listen(&self) -> Result<RunningListener, ServerError> {
        match self.bind().await {
            Ok(listener) => {
                self.alerts.remove(START_ALERT);
                let addr = listener.addr();
                *self.addr.write() = Some(addr);
                let protocol = if self.options.https_enabled.value() {
                    "https"
                } else {
                    "http"
                };
                info!("Server listening at {}://{}", protocol, addr);
                Ok(listener)
            }
            Err(e) => {
                self.alerts.set(
                    START_ALERT,
                    "Error starting server",
                    Some(&anyhow::anyhow!(e.to_string())),
                );
                Err(e)
            }
        }
    }

    fn tls_acceptor(&self) -> Result<Option<TlsAcceptor>, ServerError> {
        if !self.options.https_enabled.value() {
            return Ok(None);
        }
        let cert = self
            .options
            .https_cert
            .value()
            .ok_or(ServerError::MissingTlsFile("server.https.cert"))?;
        let key = self
            .options
            .https_key
            .value()
            .ok_or(ServerError::MissingTlsFile("server.https.key"))?;
        tls::create_tls_acceptor(&cert, &key)
            .map(Some)
            .map_err(|e| ServerError::Tls(format!("{e:#}")))
    }

    async fn bind(&self) -> Result<RunningListener, ServerError> {
        let tls = self.tls_acceptor()?;
        let tcp = network::bind(&self.options.host.value(), self.options.port.value()).await?;

        let mock = Arc::clone(&self.mock);
        let cors = self.options.cors.clone();
        let handler: RequestHandler = Arc::new(move |req, peer| {
            handle_request(req, peer, Arc::clone(&mock), cors.value()).boxed()
        });
        Ok(listener::spawn("server", tcp, tls, handler)?)
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        for subscription in self.subscriptions.get_mut().drain(..) {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MocksConfig;
    use crate::variant_handlers::VariantHandlers;

    fn server_with(config: MocksConfig) -> (Arc<HttpServer>, Alerts, Arc<Options>) {
        let options = Options::new(&config);
        let alerts = Alerts::new();
        let mock = Mock::new(&options, &alerts, Arc::new(VariantHandlers::default()));
        (HttpServer::new(mock, &options, &alerts), alerts, options)
    }

    fn local_config() -> MocksConfig {
        let mut config = MocksConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (server, alerts, _options) = server_with(local_config());

        let first = server.start().await.unwrap();
        let second = server.start().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(server.local_addr(), Some(first));
        assert!(alerts.flat().is_empty());

        server.stop().await;
        server.stop().await;
        assert!(!server.is_running().await);
        assert_eq!(server.local_addr(), None);
    }

    #[tokio::test]
    async fn test_missing_tls_files_alert() {
        let mut config = local_config();
        config.server.https.enabled = true;
        let (server, alerts, _options) = server_with(config);

        let err = server.start().await.unwrap_err();
        assert!(matches!(err, ServerError::MissingTlsFile("server.https.cert")));
        assert!(alerts.find("server:start").is_some());
        assert!(!server.is_running().await);
    }

    #[tokio::test]
    async fn test_successful_start_removes_alert() {
        let occupied = network::bind("127.0.0.1", 0).await.unwrap();
        let mut config = local_config();
        config.server.port = occupied.local_addr().unwrap().port();
        let (server, alerts, options) = server_with(config);

        assert!(matches!(server.start().await, Err(ServerError::Bind(..))));
        assert!(alerts.find("server:start").is_some());

        options.server.port.set(0);
        server.restart().await.unwrap();
        assert!(alerts.find("server:start").is_none());
        server.stop().await;
    }
}
