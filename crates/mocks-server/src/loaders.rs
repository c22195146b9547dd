//! Registry of definition sources.
//!
//! Routes and collections can come from several independent sources: the
//! files loader, plugins, or programmatic calls. Each source gets a
//! [`Loader`] from a [`Loaders`] registry and pushes plain definitions into
//! it whenever it has new data. Once every registered loader has reported at
//! least once, each further load produces one combined sequence, ordered by
//! loader registration, and the registry's `on_load` callback runs.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

struct LoaderEntry {
    id: String,
    loaded: bool,
    contents: Vec<Value>,
}

type OnLoad = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    kind: &'static str,
    entries: Mutex<Vec<LoaderEntry>>,
    on_load: Mutex<Option<OnLoad>>,
}

/// One registry of loaders, e.g. all route sources.
#[derive(Clone)]
pub struct Loaders {
    inner: Arc<Inner>,
}

impl Loaders {
    /// `kind` names the definitions for logs ("routes", "collections").
    pub fn new(kind: &'static str) -> Self {
        Self {
            inner: Arc::new(Inner {
                kind,
                entries: Mutex::new(Vec::new()),
                on_load: Mutex::new(None),
            }),
        }
    }

    /// Callback run after a load once every loader is ready.
    pub fn set_on_load(&self, on_load: impl Fn() + Send + Sync + 'static) {
        *self.inner.on_load.lock() = Some(Arc::new(on_load));
    }

    /// Register a new source. Until it loads, the registry is not ready.
    pub fn create(&self, id: impl Into<String>) -> Loader {
        let id = id.into();
        self.inner.entries.lock().push(LoaderEntry {
            id: id.clone(),
            loaded: false,
            contents: Vec::new(),
        });
        debug!(kind = self.inner.kind, loader = %id, "Loader registered");
        Loader {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Whether every registered loader has loaded at least once
    pub fn ready(&self) -> bool {
        self.inner.entries.lock().iter().all(|entry| entry.loaded)
    }

    /// Definitions of every loader, concatenated in registration order
    pub fn contents(&self) -> Vec<Value> {
        self.inner
            .entries
            .lock()
            .iter()
            .flat_map(|entry| entry.contents.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle of one definitions source.
#[derive(Clone)]
pub struct Loader {
    id: String,
    inner: Arc<Inner>,
}

impl Loader {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace this source's definitions.
    pub fn load(&self, contents: Vec<Value>) {
        if self.store(contents) {
            let on_load = self.inner.on_load.lock().clone();
            if let Some(on_load) = on_load {
                on_load();
            }
        }
    }

    /// Replace this source's definitions without running `on_load`.
    /// Returns whether every loader of the registry is ready.
    pub fn store(&self, contents: Vec<Value>) -> bool {
        let ready = {
            let mut entries = self.inner.entries.lock();
            if let Some(entry) = entries.iter_mut().find(|entry| entry.id == self.id) {
                entry.loaded = true;
                entry.contents = contents;
            }
            entries.iter().all(|entry| entry.loaded)
        };
        debug!(kind = self.inner.kind, loader = %self.id, ready, "Definitions loaded");
        ready
    }
}
