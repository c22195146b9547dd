//! Admin REST API.
//!
//! Built-in plugin (`adminApi`) serving a separate listener for:
//! - Reading and patching the configuration
//! - Listing alerts
//! - Inspecting routes, variants and collections
//! - Setting and restoring custom route variants
//! - Health, about and metrics endpoints
//!
//! The API listens on `plugins.adminApi.port` (default: 3110).

mod handlers;
mod router;
mod server;
mod types;

pub use router::route_by_path;
pub use server::AdminApiServer;
pub use types::AdminState;

use crate::plugins::{Plugin, PluginContext};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;

pub const PLUGIN_ID: &str = "adminApi";

#[derive(Default)]
pub struct AdminApi {
    server: Mutex<Option<Arc<AdminApiServer>>>,
}

impl AdminApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the admin listener, if running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server
            .lock()
            .as_ref()
            .and_then(|server| server.local_addr())
    }

    fn server(&self) -> Option<Arc<AdminApiServer>> {
        self.server.lock().clone()
    }
}

#[async_trait]
impl Plugin for AdminApi {
    fn id(&self) -> Option<String> {
        Some(PLUGIN_ID.to_string())
    }

    async fn init(&self, context: &PluginContext) -> anyhow::Result<()> {
        let state = AdminState::new(
            Arc::clone(context.mock()),
            Arc::clone(context.options()),
            context.all_alerts().clone(),
        );
        let server = AdminApiServer::new(
            state,
            context.options().admin_api.clone(),
            context.alerts().clone(),
        );
        *self.server.lock() = Some(server);
        Ok(())
    }

    async fn start(&self, _context: &PluginContext) -> anyhow::Result<()> {
        if let Some(server) = self.server() {
            server.start().await?;
        }
        Ok(())
    }

    async fn stop(&self, _context: &PluginContext) -> anyhow::Result<()> {
        if let Some(server) = self.server() {
            server.stop().await;
        }
        Ok(())
    }
}
