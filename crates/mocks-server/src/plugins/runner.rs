use super::{Plugin, PluginContext};
use crate::alerts::Alerts;
use crate::config::Options;
use crate::mock::Mock;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStage {
    Register,
    Init,
    Start,
    Stop,
}

impl PluginStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginStage::Register => "register",
            PluginStage::Init => "init",
            PluginStage::Start => "start",
            PluginStage::Stop => "stop",
        }
    }
}

struct PluginEntry {
    plugin: Arc<dyn Plugin>,
    context: PluginContext,
}

impl PluginEntry {
    async fn run(&self, stage: PluginStage) {
        let context = &self.context;
        let result = AssertUnwindSafe(async {
            match stage {
                PluginStage::Register => self.plugin.register(context).await,
                PluginStage::Init => self.plugin.init(context).await,
                PluginStage::Start => self.plugin.start(context).await,
                PluginStage::Stop => self.plugin.stop(context).await,
            }
        })
        .catch_unwind()
        .instrument(context.span().clone())
        .await
        .unwrap_or_else(|panic| Err(anyhow::anyhow!("Panicked: {}", panic_message(&*panic))));

        match result {
            Ok(()) => {
                context.alerts().remove(stage.as_str());
                debug!(plugin = context.id(), stage = stage.as_str(), "Plugin stage done");
            }
            Err(e) => context.alerts().set(
                stage.as_str(),
                format!("Error in plugin \"{}\" {}", context.id(), stage.as_str()),
                Some(&e),
            ),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Plugins of one server instance, run in registration order
pub struct Plugins {
    entries: Vec<PluginEntry>,
}

impl Plugins {
    /// `alerts` is the root handle of the server. Until `register` runs, a
    /// plugin's alerts live under `plugins:<index>`.
    pub fn new(
        plugins: Vec<Arc<dyn Plugin>>,
        mock: &Arc<Mock>,
        options: &Arc<Options>,
        alerts: &Alerts,
    ) -> Self {
        let plugins_alerts = alerts.collection("plugins");
        let entries = plugins
            .into_iter()
            .enumerate()
            .map(|(index, plugin)| {
                let id = index.to_string();
                PluginEntry {
                    plugin,
                    context: PluginContext::new(
                        id.clone(),
                        Arc::clone(mock),
                        Arc::clone(options),
                        plugins_alerts.collection(&id),
                        alerts.clone(),
                    ),
                }
            })
            .collect();
        Self { entries }
    }

    /// Run `register` and adopt the id each plugin reports afterwards
    pub async fn register(&mut self) {
        for entry in &mut self.entries {
            entry.run(PluginStage::Register).await;
            if let Some(id) = entry.plugin.id().filter(|id| !id.is_empty()) {
                if id != entry.context.id() {
                    entry.context = entry.context.renamed(id);
                }
            }
        }
    }

    pub async fn init(&self) {
        for entry in &self.entries {
            entry.run(PluginStage::Init).await;
        }
    }

    pub async fn start(&self) {
        for entry in &self.entries {
            entry.run(PluginStage::Start).await;
        }
    }

    /// Stop in reverse order
    pub async fn stop(&self) {
        for entry in self.entries.iter().rev() {
            entry.run(PluginStage::Stop).await;
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.context.id().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
