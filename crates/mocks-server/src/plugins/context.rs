use crate::alerts::Alerts;
use crate::config::Options;
use crate::mock::{Mock, MockLoaders};
use serde_json::Value;
use std::sync::Arc;
use tracing::Span;

/// What a plugin gets to work with.
#[derive(Clone)]
pub struct PluginContext {
    id: String,
    mock: Arc<Mock>,
    options: Arc<Options>,
    alerts: Alerts,
    root_alerts: Alerts,
    span: Span,
}

impl PluginContext {
    pub(crate) fn new(
        id: String,
        mock: Arc<Mock>,
        options: Arc<Options>,
        alerts: Alerts,
        root_alerts: Alerts,
    ) -> Self {
        let span = tracing::info_span!("plugin", id = %id);
        Self {
            id,
            mock,
            options,
            alerts,
            root_alerts,
            span,
        }
    }

    /// Same context under a new id, carrying its alerts over.
    pub(crate) fn renamed(&self, id: String) -> Self {
        let alerts = self.alerts.rename(&id);
        Self::new(
            id,
            Arc::clone(&self.mock),
            Arc::clone(&self.options),
            alerts,
            self.root_alerts.clone(),
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mock(&self) -> &Arc<Mock> {
        &self.mock
    }

    pub fn options(&self) -> &Arc<Options> {
        &self.options
    }

    /// Alerts scoped to `plugins:<id>`
    pub fn alerts(&self) -> &Alerts {
        &self.alerts
    }

    /// Alerts of the whole server
    pub fn all_alerts(&self) -> &Alerts {
        &self.root_alerts
    }

    /// The `plugins.<id>` config section
    pub fn config(&self) -> Option<Value> {
        self.options.plugin_config(&self.id)
    }

    /// Register route and collection sources for this plugin. The mock does
    /// not load until both have loaded once.
    pub fn loaders(&self) -> MockLoaders {
        self.mock.create_loaders(&self.id)
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("id", &self.id)
            .field("alerts", &self.alerts)
            .finish()
    }
}
