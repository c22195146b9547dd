//! Files loader.
//!
//! Reads route and collection definitions from the mocks folder
//! (`files.path`) and pushes them into its own pair of loaders. While
//! `files.watch` is enabled the folder is polled and reloaded on changes.

mod reader;
mod scaffold;
mod watch;

pub use reader::{read_array, read_definitions, Definitions, COLLECTIONS_FILE_NAMES, ROUTES_FOLDER};
pub use scaffold::scaffold;
pub use watch::{fingerprint, Fingerprint, WATCH_INTERVAL};

use crate::alerts::Alerts;
use crate::config::{FilesOptions, Options};
use crate::listeners::Subscription;
use crate::mock::{Mock, MockLoaders};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const LOADER_ID: &str = "files";

pub struct FilesLoader {
    options: FilesOptions,
    alerts: Alerts,
    loaders: Option<MockLoaders>,
    reload_lock: tokio::sync::Mutex<()>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

fn spawn_on_runtime<F>(name: &'static str, task: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(task);
        }
        Err(_) => debug!(option = name, "No runtime available, change ignored"),
    }
}

impl FilesLoader {
    /// No loaders are registered when `files.enabled` is false.
    pub fn new(mock: &Mock, options: &Options, alerts: &Alerts) -> Arc<Self> {
        let files_options = options.files.clone();
        let loaders = files_options
            .enabled
            .value()
            .then(|| mock.create_loaders(LOADER_ID));

        let loader = Arc::new(Self {
            options: files_options,
            alerts: alerts.collection("files"),
            loaders,
            reload_lock: tokio::sync::Mutex::new(()),
            watcher: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
        });

        if loader.is_enabled() {
            let on_path = Arc::downgrade(&loader);
            let on_watch = Arc::downgrade(&loader);
            *loader.subscriptions.lock() = vec![
                loader.options.path.on_change(move |_| {
                    let weak = on_path.clone();
                    spawn_on_runtime("files.path", async move {
                        if let Some(loader) = weak.upgrade() {
                            loader.path_changed().await;
                        }
                    });
                }),
                loader.options.watch.on_change(move |watch| {
                    let Some(loader) = on_watch.upgrade() else {
                        return;
                    };
                    if *watch {
                        spawn_on_runtime("files.watch", async move { loader.start() });
                    } else {
                        loader.stop();
                    }
                }),
            ];
        }
        loader
    }

    pub fn is_enabled(&self) -> bool {
        self.loaders.is_some()
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(self.options.path.value())
    }

    /// Create the example folder if needed and load it once.
    pub async fn init(&self) -> anyhow::Result<()> {
        if !self.is_enabled() {
            debug!("Files loader disabled");
            return Ok(());
        }
        if self.options.scaffold.value() {
            let root = self.path();
            tokio::task::spawn_blocking(move || scaffold(&root)).await??;
        }
        self.load().await;
        Ok(())
    }

    /// Read the folder and push its definitions. Reloads never overlap.
    pub async fn load(&self) {
        let Some(loaders) = &self.loaders else {
            return;
        };
        let _guard = self.reload_lock.lock().await;

        let root = self.path();
        let alerts = self.alerts.clone();
        info!(path = %root.display(), "Loading files");
        let definitions =
            match tokio::task::spawn_blocking(move || read_definitions(&root, &alerts)).await {
                Ok(definitions) => definitions,
                Err(e) => {
                    warn!("Files loading task failed: {}", e);
                    return;
                }
            };
        debug!(
            routes = definitions.routes.len(),
            collections = definitions.collections.len(),
            "Files loaded"
        );
        loaders.load(definitions.routes, definitions.collections);
    }

    /// Start polling the folder. Does nothing when watching is disabled or
    /// already running.
    pub fn start(self: &Arc<Self>) {
        if !self.is_enabled() || !self.options.watch.value() {
            return;
        }
        let mut watcher = self.watcher.lock();
        if watcher.is_some() {
            return;
        }
        let root = self.path();
        info!(path = %root.display(), "Watching files");
        *watcher = Some(tokio::spawn(watch_folder(root, Arc::downgrade(self))));
    }

    pub fn stop(&self) {
        if let Some(watcher) = self.watcher.lock().take() {
            watcher.abort();
            debug!("Stopped watching files");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.lock().is_some()
    }

    async fn path_changed(self: Arc<Self>) {
        self.load().await;
        if self.is_watching() {
            self.stop();
            self.start();
        }
    }
}

async fn watch_folder(root: PathBuf, loader: Weak<FilesLoader>) {
    let read = |root: PathBuf| async move {
        tokio::task::spawn_blocking(move || fingerprint(&root))
            .await
            .unwrap_or_default()
    };
    let mut last = read(root.clone()).await;
    let mut interval = tokio::time::interval(WATCH_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        interval.tick().await;
        let current = read(root.clone()).await;
        if current == last {
            continue;
        }
        last = current;
        let Some(loader) = loader.upgrade() else {
            break;
        };
        info!(path = %root.display(), "Files changed");
        loader.load().await;
    }
}

impl Drop for FilesLoader {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.get_mut().take() {
            watcher.abort();
        }
        for subscription in self.subscriptions.get_mut().drain(..) {
            subscription.unsubscribe();
        }
    }
}
