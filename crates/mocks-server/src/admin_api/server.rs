//! Admin API server.

use crate::admin_api::router::route_request;
use crate::admin_api::types::AdminState;
use crate::alerts::Alerts;
use crate::config::AdminApiOptions;
use crate::error::ServerError;
use crate::listeners::Subscription;
use crate::server::listener::{self, RequestHandler, RunningListener};
use crate::server::network;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

const START_ALERT: &str = "start";

/// Admin API listener, started and stopped by the `adminApi` plugin
pub struct AdminApiServer {
    state: Arc<AdminState>,
    options: AdminApiOptions,
    alerts: Alerts,
    running: tokio::sync::Mutex<Option<RunningListener>>,
    addr: RwLock<Option<SocketAddr>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

enum OptionChange {
    Enabled(bool),
    Address,
}

impl AdminApiServer {
    /// `alerts` is the namespace of the plugin
    pub fn new(state: AdminState, options: AdminApiOptions, alerts: Alerts) -> Arc<Self> {
        let server = Arc::new(Self {
            state: Arc::new(state),
            options,
            alerts,
            running: tokio::sync::Mutex::new(None),
            addr: RwLock::new(None),
            subscriptions: Mutex::new(Vec::new()),
        });

        let enabled = Arc::downgrade(&server);
        let host = Arc::downgrade(&server);
        let port = Arc::downgrade(&server);
        *server.subscriptions.lock() = vec![
            server.options.enabled.on_change(move |enabled_now| {
                Self::spawn_change(&enabled, OptionChange::Enabled(*enabled_now))
            }),
            server
                .options
                .host
                .on_change(move |_| Self::spawn_change(&host, OptionChange::Address)),
            server
                .options
                .port
                .on_change(move |_| Self::spawn_change(&port, OptionChange::Address)),
        ];
        server
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.addr.read()
    }

    /// Start listening unless disabled or already running
    pub async fn start(&self) -> Result<(), ServerError> {
        if !self.options.enabled.value() {
            debug!("Admin API disabled");
            return Ok(());
        }
        let mut running = self.running.lock().await;
        if running.is_none() {
            *running = Some(self.listen().await?);
        }
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(listener) = self.running.lock().await.take() {
            listener.shutdown().await;
            *self.addr.write() = None;
        }
    }

    fn spawn_change(server: &Weak<Self>, change: OptionChange) {
        let Some(server) = server.upgrade() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { server.apply_change(change).await });
            }
            Err(_) => debug!("No runtime available, admin API options ignored"),
        }
    }

    async fn apply_change(&self, change: OptionChange) {
        let result = match change {
            OptionChange::Enabled(true) => self.start().await,
            OptionChange::Enabled(false) => {
                self.stop().await;
                Ok(())
            }
            OptionChange::Address => {
                let mut running = self.running.lock().await;
                match running.take() {
                    Some(listener) => {
                        info!("Admin API options changed, restarting");
                        listener.shutdown().await;
                        *self.addr.write() = None;
                        self.listen().await.map(|listener| {
                            *running = Some(listener);
                        })
                    }
                    None => Ok(()),
                }
            }
        };
        // Failures are already reported as an alert
        if let Err(e) = result {
            debug!("Admin API not restarted: {}", e);
        }
    }

    async fn listen(&self) -> Result<RunningListener, ServerError> {
        match self.bind().await {
            Ok(listener) => {
                self.alerts.remove(START_ALERT);
                *self.addr.write() = Some(listener.addr());
                info!("Admin API listening on http://{}", listener.addr());
                Ok(listener)
            }
            Err(e) => {
                self.alerts.set(
                    START_ALERT,
                    "Error starting admin API",
                    Some(&anyhow::anyhow!(e.to_string())),
                );
                Err(e)
            }
        }
    }

    async fn bind(&self) -> Result<RunningListener, ServerError> {
        let tcp = network::bind(&self.options.host.value(), self.options.port.value()).await?;
        let state = Arc::clone(&self.state);
        let handler: RequestHandler =
            Arc::new(move |req, _peer| route_request(req, Arc::clone(&state)).boxed());
        Ok(listener::spawn("admin-api", tcp, None, handler)?)
    }
}

impl Drop for AdminApiServer {
    fn drop(&mut self) {
        for subscription in self.subscriptions.get_mut().drain(..) {
            subscription.unsubscribe();
        }
    }
}
