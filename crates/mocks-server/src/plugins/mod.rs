//! Plugins extend a server instance from the outside: they can add route
//! and collection sources, read and change options, and drive the mock at
//! runtime. The admin API is itself a plugin.

mod context;
mod runner;

pub use context::PluginContext;
pub use runner::{PluginStage, Plugins};

use async_trait::async_trait;

/// Lifecycle hooks of a plugin. Every hook is optional.
///
/// `register` runs once when the server is built, `init` after the
/// configuration is settled, `start` and `stop` together with the server.
/// An error in any hook is reported as an alert and does not affect other
/// plugins.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Identifier used for alerts and for the plugin config section.
    /// Read after `register`.
    fn id(&self) -> Option<String> {
        None
    }

    async fn register(&self, _context: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn init(&self, _context: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn start(&self, _context: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop(&self, _context: &PluginContext) -> anyhow::Result<()> {
        Ok(())
    }
}
