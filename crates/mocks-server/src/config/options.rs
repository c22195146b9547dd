//! Runtime config store.

use super::option::ConfigOption;
use super::{
    AdminApiConfig, CollectionsConfig, CorsConfig, FilesConfig, HttpsConfig, LogLevel, MockConfig,
    MocksConfig, PluginsConfig, RoutesConfig, ServerConfig,
};
use crate::error::ConfigError;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MockOptions {
    pub selected_collection: ConfigOption<Option<String>>,
    pub delay: ConfigOption<u64>,
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: ConfigOption<String>,
    pub port: ConfigOption<u16>,
    pub cors: ConfigOption<bool>,
    pub https_enabled: ConfigOption<bool>,
    pub https_cert: ConfigOption<Option<String>>,
    pub https_key: ConfigOption<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct FilesOptions {
    pub enabled: ConfigOption<bool>,
    pub path: ConfigOption<String>,
    pub watch: ConfigOption<bool>,
    pub scaffold: ConfigOption<bool>,
}

#[derive(Debug, Clone)]
pub struct AdminApiOptions {
    pub enabled: ConfigOption<bool>,
    pub host: ConfigOption<String>,
    pub port: ConfigOption<u16>,
}

/// Every tunable of one server instance.
#[derive(Debug)]
pub struct Options {
    pub mock: MockOptions,
    pub server: ServerOptions,
    pub files: FilesOptions,
    pub admin_api: AdminApiOptions,
    pub log: ConfigOption<LogLevel>,
    plugins: RwLock<BTreeMap<String, Value>>,
}

impl Options {
    pub fn new(config: &MocksConfig) -> Arc<Self> {
        Arc::new(Self {
            mock: MockOptions {
                selected_collection: ConfigOption::new(
                    "mock.collections.selected",
                    config.mock.collections.selected.clone(),
                ),
                delay: ConfigOption::new("mock.routes.delay", config.mock.routes.delay),
            },
            server: ServerOptions {
                host: ConfigOption::new("server.host", config.server.host.clone()),
                port: ConfigOption::new("server.port", config.server.port),
                cors: ConfigOption::new("server.cors.enabled", config.server.cors.enabled),
                https_enabled: ConfigOption::new(
                    "server.https.enabled",
                    config.server.https.enabled,
                ),
                https_cert: ConfigOption::new("server.https.cert", config.server.https.cert.clone()),
                https_key: ConfigOption::new("server.https.key", config.server.https.key.clone()),
            },
            files: FilesOptions {
                enabled: ConfigOption::new("files.enabled", config.files.enabled),
                path: ConfigOption::new("files.path", config.files.path.clone()),
                watch: ConfigOption::new("files.watch", config.files.watch),
                scaffold: ConfigOption::new("files.scaffold", config.files.scaffold),
            },
            admin_api: AdminApiOptions {
                enabled: ConfigOption::new(
                    "plugins.adminApi.enabled",
                    config.plugins.admin_api.enabled,
                ),
                host: ConfigOption::new("plugins.adminApi.host", config.plugins.admin_api.host.clone()),
                port: ConfigOption::new("plugins.adminApi.port", config.plugins.admin_api.port),
            },
            log: ConfigOption::new("log", config.log),
            plugins: RwLock::new(config.plugins.other.clone()),
        })
    }

    /// Snapshot of the current values as a config tree
    pub fn to_config(&self) -> MocksConfig {
        MocksConfig {
            mock: MockConfig {
                collections: CollectionsConfig {
                    selected: self.mock.selected_collection.value(),
                },
                routes: RoutesConfig {
                    delay: self.mock.delay.value(),
                },
            },
            server: ServerConfig {
                host: self.server.host.value(),
                port: self.server.port.value(),
                cors: CorsConfig {
                    enabled: self.server.cors.value(),
                },
                https: HttpsConfig {
                    enabled: self.server.https_enabled.value(),
                    cert: self.server.https_cert.value(),
                    key: self.server.https_key.value(),
                },
            },
            files: FilesConfig {
                enabled: self.files.enabled.value(),
                path: self.files.path.value(),
                watch: self.files.watch.value(),
                scaffold: self.files.scaffold.value(),
            },
            plugins: PluginsConfig {
                admin_api: AdminApiConfig {
                    enabled: self.admin_api.enabled.value(),
                    host: self.admin_api.host.value(),
                    port: self.admin_api.port.value(),
                },
                other: self.plugins.read().clone(),
            },
            log: self.log.value(),
        }
    }

    /// Free-form config section of a plugin
    pub fn plugin_config(&self, plugin_id: &str) -> Option<Value> {
        self.plugins.read().get(plugin_id).cloned()
    }

    /// Set every option from `config`. Listeners fire for changed values only.
    pub fn apply(&self, config: &MocksConfig) {
        *self.plugins.write() = config.plugins.other.clone();

        self.log.set(config.log);

        self.files.enabled.set(config.files.enabled);
        self.files.scaffold.set(config.files.scaffold);
        self.files.path.set(config.files.path.clone());
        self.files.watch.set(config.files.watch);

        self.server.cors.set(config.server.cors.enabled);
        self.server.https_cert.set(config.server.https.cert.clone());
        self.server.https_key.set(config.server.https.key.clone());
        self.server.https_enabled.set(config.server.https.enabled);
        self.server.host.set(config.server.host.clone());
        self.server.port.set(config.server.port);

        self.admin_api.enabled.set(config.plugins.admin_api.enabled);
        self.admin_api.host.set(config.plugins.admin_api.host.clone());
        self.admin_api.port.set(config.plugins.admin_api.port);

        self.mock.delay.set(config.mock.routes.delay);
        self.mock
            .selected_collection
            .set(config.mock.collections.selected.clone());
    }

    /// Deep-merge a partial JSON tree over the current values, validate the
    /// result and apply it. Nothing changes when validation fails.
    pub fn apply_patch(&self, patch: &Value) -> Result<(), ConfigError> {
        if !patch.is_object() {
            return Err(ConfigError::Invalid(
                "config patch must be a JSON object".to_string(),
            ));
        }
        let mut merged = serde_json::to_value(self.to_config())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        merge_json(&mut merged, patch);

        let next: MocksConfig =
            serde_json::from_value(merged).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        next.validate()?;
        self.apply(&next);
        Ok(())
    }
}

/// Objects merge key by key; any other value replaces the target.
fn merge_json(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match target_map.get_mut(key) {
                    Some(existing) if existing.is_object() && patch_value.is_object() => {
                        merge_json(existing, patch_value)
                    }
                    _ => {
                        target_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_round_trip_snapshot() {
        let mut config = MocksConfig::default();
        config.mock.collections.selected = Some("base".to_string());
        config.server.port = 4100;
        let options = Options::new(&config);
        assert_eq!(options.to_config(), config);
    }

    #[test]
    fn test_apply_patch_changes_only_given_options() {
        let options = Options::new(&MocksConfig::default());
        let port_changes = Arc::new(AtomicUsize::new(0));
        let p = Arc::clone(&port_changes);
        let _sub = options.server.port.on_change(move |_| {
            p.fetch_add(1, Ordering::SeqCst);
        });

        options
            .apply_patch(&json!({"mock": {"collections": {"selected": "alt"}, "routes": {"delay": 300}}}))
            .unwrap();

        assert_eq!(
            options.mock.selected_collection.value().as_deref(),
            Some("alt")
        );
        assert_eq!(options.mock.delay.value(), 300);
        assert_eq!(options.server.port.value(), 3100);
        assert_eq!(port_changes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_apply_patch_is_all_or_nothing() {
        let options = Options::new(&MocksConfig::default());

        let err = options
            .apply_patch(&json!({"mock": {"routes": {"delay": 50}}, "server": {"port": "nope"}}))
            .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid(_)));
        assert_eq!(options.mock.delay.value(), 0);
    }

    #[test]
    fn test_apply_patch_null_unsets_selected() {
        let mut config = MocksConfig::default();
        config.mock.collections.selected = Some("base".to_string());
        let options = Options::new(&config);

        options
            .apply_patch(&json!({"mock": {"collections": {"selected": null}}}))
            .unwrap();

        assert_eq!(options.mock.selected_collection.value(), None);
    }

    #[test]
    fn test_apply_patch_rejects_non_object() {
        let options = Options::new(&MocksConfig::default());
        assert!(options.apply_patch(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_plugin_sections() {
        let mut config = MocksConfig::default();
        config
            .plugins
            .other
            .insert("recorder".to_string(), json!({"enabled": true}));
        let options = Options::new(&config);

        assert_eq!(
            options.plugin_config("recorder"),
            Some(json!({"enabled": true}))
        );
        assert_eq!(options.plugin_config("other"), None);

        options
            .apply_patch(&json!({"plugins": {"recorder": {"enabled": false}}}))
            .unwrap();
        assert_eq!(
            options.plugin_config("recorder"),
            Some(json!({"enabled": false}))
        );
    }

    #[test]
    fn test_merge_json_nested() {
        let mut target = json!({"a": {"b": 1, "c": 2}, "d": 3});
        merge_json(&mut target, &json!({"a": {"b": 10}, "e": 4}));
        assert_eq!(target, json!({"a": {"b": 10, "c": 2}, "d": 3, "e": 4}));
    }
}
