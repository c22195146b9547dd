//! Hierarchical store of operational alerts.
//!
//! Alerts are warnings or errors about the state of the server (invalid
//! route definitions, a collection that could not be selected, a listener
//! that failed to bind...). They are kept for live introspection through the
//! admin API, in addition to being logged.
//!
//! Ids are path-like: `mock:collections:load:base:from`. A scoped [`Alerts`]
//! handle prefixes every id with its namespace, so subsystems only deal with
//! their own relative ids.

use crate::listeners::{Listeners, Subscription};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq)]
struct AlertEntry {
    path: Vec<String>,
    message: String,
    error: Option<String>,
}

impl AlertEntry {
    fn starts_with(&self, prefix: &[String]) -> bool {
        self.path.len() >= prefix.len() && self.path[..prefix.len()] == *prefix
    }
}

/// Error details attached to an alert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertError {
    pub message: String,
}

/// Alert flattened for display: the full id joined with `:`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatAlert {
    pub id: String,
    pub message: String,
    pub error: Option<AlertError>,
}

#[derive(Default)]
struct AlertStore {
    entries: RwLock<Vec<AlertEntry>>,
    listeners: Listeners<()>,
}

/// Scoped handle over one server's alert store.
#[derive(Clone)]
pub struct Alerts {
    store: Arc<AlertStore>,
    namespace: Vec<String>,
}

fn split_id(id: &str) -> impl Iterator<Item = String> + '_ {
    id.split(SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

impl Alerts {
    /// Create an empty store and return its root handle.
    pub fn new() -> Self {
        Self {
            store: Arc::new(AlertStore::default()),
            namespace: Vec::new(),
        }
    }

    /// Handle scoped to a child namespace.
    pub fn collection(&self, name: &str) -> Alerts {
        let mut namespace = self.namespace.clone();
        namespace.extend(split_id(name));
        Alerts {
            store: Arc::clone(&self.store),
            namespace,
        }
    }

    /// Full id of this handle's namespace.
    pub fn id(&self) -> String {
        self.namespace.join(":")
    }

    fn path_of(&self, id: &str) -> Vec<String> {
        let mut path = self.namespace.clone();
        path.extend(split_id(id));
        path
    }

    /// Create or replace the alert `id`.
    pub fn set(&self, id: &str, message: impl Into<String>, err: Option<&anyhow::Error>) {
        let entry = AlertEntry {
            path: self.path_of(id),
            message: message.into(),
            error: err.map(|e| format!("{e:#}")),
        };
        let full_id = entry.path.join(":");

        match &entry.error {
            Some(error_message) => {
                error!(alert = %full_id, error = %error_message, "{}", entry.message)
            }
            None => warn!(alert = %full_id, "{}", entry.message),
        }

        let changed = {
            let mut entries = self.store.entries.write();
            match entries.iter_mut().find(|e| e.path == entry.path) {
                Some(existing) if *existing == entry => false,
                Some(existing) => {
                    *existing = entry;
                    true
                }
                None => {
                    entries.push(entry);
                    true
                }
            }
        };
        if changed {
            self.store.listeners.emit(&());
        }
    }

    /// Remove the alert `id` and every alert nested under it.
    pub fn remove(&self, id: &str) {
        let prefix = self.path_of(id);
        self.remove_prefix(&prefix);
    }

    /// Remove every alert in this namespace.
    pub fn clean(&self) {
        let prefix = self.namespace.clone();
        self.remove_prefix(&prefix);
    }

    fn remove_prefix(&self, prefix: &[String]) {
        let removed = {
            let mut entries = self.store.entries.write();
            let before = entries.len();
            entries.retain(|e| !e.starts_with(prefix));
            before != entries.len()
        };
        if removed {
            self.store.listeners.emit(&());
        }
    }

    /// Move this namespace to a sibling called `new_name`, carrying every
    /// alert already stored under it. Returns the handle for the new name.
    pub fn rename(&self, new_name: &str) -> Alerts {
        let mut new_namespace = self.namespace.clone();
        new_namespace.pop();
        new_namespace.extend(split_id(new_name));

        if new_namespace == self.namespace {
            return self.clone();
        }

        let moved = {
            let mut entries = self.store.entries.write();
            let mut moved = false;
            for entry in entries.iter_mut().filter(|e| e.starts_with(&self.namespace)) {
                let rest = entry.path.split_off(self.namespace.len());
                entry.path = new_namespace.iter().cloned().chain(rest).collect();
                moved = true;
            }
            moved
        };
        if moved {
            self.store.listeners.emit(&());
        }

        Alerts {
            store: Arc::clone(&self.store),
            namespace: new_namespace,
        }
    }

    /// Alerts in this namespace, in insertion order, with full ids.
    pub fn flat(&self) -> Vec<FlatAlert> {
        self.store
            .entries
            .read()
            .iter()
            .filter(|e| e.starts_with(&self.namespace))
            .map(|e| FlatAlert {
                id: e.path.join(":"),
                message: e.message.clone(),
                error: e.error.clone().map(|message| AlertError { message }),
            })
            .collect()
    }

    /// Find an alert by its full id.
    pub fn find(&self, full_id: &str) -> Option<FlatAlert> {
        self.flat().into_iter().find(|alert| alert.id == full_id)
    }

    /// Notified whenever any alert of the store is added, changed or removed.
    pub fn on_change(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.store.listeners.subscribe(move |_| listener())
    }
}

impl Default for Alerts {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Alerts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alerts")
            .field("namespace", &self.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ids(alerts: &Alerts) -> Vec<String> {
        alerts.flat().into_iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_set_is_idempotent_per_id() {
        let root = Alerts::new();
        let mock = root.collection("mock");

        mock.set("collections:selected", "first", None);
        mock.set("collections:selected", "second", None);

        let flat = root.flat();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].id, "mock:collections:selected");
        assert_eq!(flat[0].message, "second");
    }

    #[test]
    fn test_remove_drops_nested_entries() {
        let root = Alerts::new();
        let load = root.collection("mock:collections:load");
        load.set("", "2 errors", None);
        load.set("a:from", "bad from", None);
        load.set("b:variants", "bad variants", None);
        root.set("mock:collections:selected", "kept", None);

        root.collection("mock").remove("collections:load");

        assert_eq!(ids(&root), vec!["mock:collections:selected"]);
    }

    #[test]
    fn test_remove_does_not_match_partial_segments() {
        let root = Alerts::new();
        root.set("routes:load:user", "a", None);
        root.set("routes:load:users", "b", None);

        root.remove("routes:load:user");

        assert_eq!(ids(&root), vec!["routes:load:users"]);
    }

    #[test]
    fn test_scoped_flat_only_lists_namespace() {
        let root = Alerts::new();
        root.collection("mock").set("routes:empty", "no routes", None);
        root.collection("files").set("load:x.json", "bad", None);

        assert_eq!(ids(&root.collection("files")), vec!["files:load:x.json"]);
        assert_eq!(root.flat().len(), 2);
    }

    #[test]
    fn test_rename_moves_existing_alerts() {
        let root = Alerts::new();
        let provisional = root.collection("plugins:0");
        provisional.set("register", "boom", None);

        let renamed = provisional.rename("my-plugin");
        renamed.set("init", "boom again", None);

        assert_eq!(
            ids(&root),
            vec!["plugins:my-plugin:register", "plugins:my-plugin:init"]
        );
        assert_eq!(renamed.id(), "plugins:my-plugin");
    }

    #[test]
    fn test_error_is_flattened() {
        let root = Alerts::new();
        let err = anyhow::anyhow!("port taken");
        root.set("server:start", "Error starting server", Some(&err));

        let alert = root.find("server:start").unwrap();
        assert_eq!(alert.error.unwrap().message, "port taken");
    }

    #[test]
    fn test_on_change_fires_only_on_real_changes() {
        let root = Alerts::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = root.on_change(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        root.set("a", "x", None);
        root.set("a", "x", None);
        root.remove("missing");
        root.remove("a");

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clean_empties_namespace() {
        let root = Alerts::new();
        let files = root.collection("files");
        files.set("load:a.json", "bad", None);
        files.set("collections:not-found", "missing", None);
        root.set("server:start", "down", None);

        files.clean();

        assert_eq!(ids(&root), vec!["server:start"]);
    }
}
