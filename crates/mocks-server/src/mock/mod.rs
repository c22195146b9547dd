//! Routes, collections and what is currently served.
//!
//! [`Mock`] owns the whole resolution pipeline of one server:
//!
//! ```text
//! loaders → routes::load_routes → collections::load_collections
//!         → selected collection + custom route variants → MountedRoutes
//! ```
//!
//! Every change (new definitions, another selected collection, a custom
//! route variant) recomputes the served list from scratch and swaps the
//! mounted table in one step.

mod collections;
mod delay;
mod router;
mod routes;
mod types;

#[cfg(test)]
mod tests;

pub use collections::{load_collections, select_collection};
pub use delay::{resolve_delay, DelaySetting};
pub use router::{MountedRoute, MountedRoutes, RouteMatch};
pub use routes::load_routes;
pub use types::{
    route_variant_id, Collection, HttpMethod, PlainRoute, PlainVariant, Route, RouteMethod,
    RouteTable, Variant,
};

use crate::alerts::Alerts;
use crate::config::{MockOptions, Options};
use crate::error::MockError;
use crate::listeners::{Listeners, Subscription};
use crate::loaders::{Loader, Loaders};
use crate::variant_handlers::VariantHandlers;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Route variant chosen at runtime on top of the selected collection
#[derive(Debug, Clone)]
struct CustomRouteVariant {
    route_id: String,
    id: String,
}

#[derive(Default)]
struct State {
    routes: Arc<RouteTable>,
    collections: Arc<Vec<Arc<Collection>>>,
    selected: Option<String>,
    custom: Vec<CustomRouteVariant>,
    current: Arc<Vec<Arc<Variant>>>,
}

/// Pair of loaders handed to one definitions source
#[derive(Clone)]
pub struct MockLoaders {
    pub routes: Loader,
    pub collections: Loader,
}

impl MockLoaders {
    /// Replace the routes and collections of this source together. The
    /// mock loads once, with both sets of definitions.
    pub fn load(&self, routes: Vec<Value>, collections: Vec<Value>) {
        self.routes.store(routes);
        self.collections.load(collections);
    }
}

/// Outcome of one recomputation, committed in a single write
struct Resolved {
    selected: Option<String>,
    current: Arc<Vec<Arc<Variant>>>,
    mounted: MountedRoutes,
}

pub struct Mock {
    options: MockOptions,
    handlers: Arc<VariantHandlers>,
    routes_alerts: Alerts,
    collections_alerts: Alerts,
    router_alerts: Alerts,
    routes_loaders: Loaders,
    collections_loaders: Loaders,
    state: RwLock<State>,
    mounted: RwLock<Arc<MountedRoutes>>,
    update_lock: ReentrantMutex<()>,
    listeners: Listeners<()>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Mock {
    /// `alerts` is the namespace of the mock (usually `mock`).
    pub fn new(options: &Options, alerts: &Alerts, handlers: Arc<VariantHandlers>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Mock>| {
            let routes_loaders = Loaders::new("routes");
            let collections_loaders = Loaders::new("collections");

            let on_load = |weak: Weak<Mock>| {
                move || {
                    if let Some(mock) = weak.upgrade() {
                        mock.load_if_ready();
                    }
                }
            };
            routes_loaders.set_on_load(on_load(weak.clone()));
            collections_loaders.set_on_load(on_load(weak.clone()));

            let selected_weak = weak.clone();
            let selected_subscription =
                options.mock.selected_collection.on_change(move |selected| {
                    if let Some(mock) = selected_weak.upgrade() {
                        debug!(selected = ?selected, "Selected collection changed");
                        mock.recompute();
                    }
                });

            Mock {
                options: options.mock.clone(),
                handlers,
                routes_alerts: alerts.collection("routes"),
                collections_alerts: alerts.collection("collections"),
                router_alerts: alerts.collection("router"),
                routes_loaders,
                collections_loaders,
                state: RwLock::new(State::default()),
                mounted: RwLock::new(Arc::new(MountedRoutes::empty())),
                update_lock: ReentrantMutex::new(()),
                listeners: Listeners::new(),
                subscriptions: Mutex::new(vec![selected_subscription]),
            }
        })
    }

    /// Register a new source of route and collection definitions. Loads
    /// wait until every registered source has reported once.
    pub fn create_loaders(&self, id: &str) -> MockLoaders {
        MockLoaders {
            routes: self.routes_loaders.create(id),
            collections: self.collections_loaders.create(id),
        }
    }

    fn load_if_ready(&self) {
        if self.routes_loaders.ready() && self.collections_loaders.ready() {
            self.load();
        }
    }

    /// Validate the definitions of every loader and serve the result.
    ///
    /// Validation and selection raise alerts while no lock on the state is
    /// held, so alert listeners may read the mock.
    pub fn load(&self) {
        {
            let _guard = self.update_lock.lock();

            let routes = Arc::new(load_routes(
                &self.routes_loaders.contents(),
                &self.handlers,
                &self.routes_alerts,
            ));
            let collections = Arc::new(load_collections(
                &self.collections_loaders.contents(),
                &routes,
                &self.collections_alerts,
            ));
            info!(
                routes = routes.len(),
                collections = collections.len(),
                "Mock definitions loaded"
            );

            let custom = self.state.read().custom.clone();
            let resolved = self.resolve(&routes, &collections, &custom);

            let mut state = self.state.write();
            state.routes = routes;
            state.collections = collections;
            self.commit(&mut state, resolved);
        }
        self.listeners.emit(&());
    }

    /// Recompute what is served without validating definitions again.
    pub fn recompute(&self) {
        self.recompute_with(None);
    }

    /// Recompute with `custom` as the new custom route variants, or the
    /// current ones when `None`.
    fn recompute_with(&self, custom: Option<Vec<CustomRouteVariant>>) {
        {
            let _guard = self.update_lock.lock();
            let (routes, collections, custom) = {
                let state = self.state.read();
                (
                    Arc::clone(&state.routes),
                    Arc::clone(&state.collections),
                    custom.unwrap_or_else(|| state.custom.clone()),
                )
            };

            let resolved = self.resolve(&routes, &collections, &custom);

            let mut state = self.state.write();
            state.custom = custom;
            self.commit(&mut state, resolved);
        }
        self.listeners.emit(&());
    }

    fn resolve(
        &self,
        routes: &RouteTable,
        collections: &[Arc<Collection>],
        custom: &[CustomRouteVariant],
    ) -> Resolved {
        let requested = self.options.selected_collection.value();
        let selected = select_collection(collections, requested.as_deref(), &self.collections_alerts);

        let mut current: Vec<Arc<Variant>> = selected
            .map(|collection| {
                collection
                    .routes
                    .iter()
                    .filter_map(|id| routes.variant(id).cloned())
                    .collect()
            })
            .unwrap_or_default();

        for custom in custom {
            let Some(variant) = routes.variant(&custom.id) else {
                debug!(id = %custom.id, "Custom route variant no longer exists, skipping it");
                continue;
            };
            match current.iter_mut().find(|v| v.route_id == variant.route_id) {
                Some(entry) => *entry = Arc::clone(variant),
                None => current.push(Arc::clone(variant)),
            }
        }

        let mounted = MountedRoutes::build(&current, routes, &self.router_alerts);
        Resolved {
            selected: selected.map(|collection| collection.id.clone()),
            current: Arc::new(current),
            mounted,
        }
    }

    fn commit(&self, state: &mut State, resolved: Resolved) {
        state.selected = resolved.selected;
        state.current = resolved.current;
        *self.mounted.write() = Arc::new(resolved.mounted);

        debug!(
            selected = ?state.selected,
            served = state.current.len(),
            "Route variants recomputed"
        );
    }

    /// Serve `id` (`routeId:variantId`) for its route, on top of the
    /// selected collection.
    pub fn use_route_variant(&self, id: &str) -> Result<(), MockError> {
        let _guard = self.update_lock.lock();
        let custom = {
            let state = self.state.read();
            let route_id = state
                .routes
                .variant(id)
                .map(|variant| variant.route_id.clone())
                .ok_or_else(|| MockError::RouteVariantNotFound(id.to_string()))?;

            let mut custom = state.custom.clone();
            let entry = CustomRouteVariant {
                route_id,
                id: id.to_string(),
            };
            match custom
                .iter_mut()
                .find(|existing| existing.route_id == entry.route_id)
            {
                Some(existing) => *existing = entry,
                None => custom.push(entry),
            }
            custom
        };
        self.recompute_with(Some(custom));
        info!(id, "Custom route variant in use");
        Ok(())
    }

    /// Drop every custom route variant.
    pub fn restore_route_variants(&self) {
        self.recompute_with(Some(Vec::new()));
        info!("Custom route variants restored");
    }

    /// Change the selected collection option. Fails when no valid collection
    /// has that id.
    pub fn select_collection(&self, id: &str) -> Result<(), MockError> {
        if !self.state.read().collections.iter().any(|c| c.id == id) {
            return Err(MockError::CollectionNotFound(id.to_string()));
        }
        // Recomputation runs from the option subscription
        self.options.selected_collection.set(Some(id.to_string()));
        Ok(())
    }

    /// Notified after every recomputation.
    pub fn on_change(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(move |_| listener())
    }

    /// Table used to serve requests
    pub fn mounted(&self) -> Arc<MountedRoutes> {
        Arc::clone(&self.mounted.read())
    }

    pub fn global_delay(&self) -> u64 {
        self.options.delay.value()
    }

    /// Delay of `routeId:variantId` with the current global delay
    pub fn delay_for(&self, id: &str) -> Option<u64> {
        let state = self.state.read();
        let variant = state.routes.variant(id)?;
        let route = state.routes.route(&variant.route_id)?;
        Some(resolve_delay(variant.delay, route.delay, self.global_delay()))
    }

    pub fn routes(&self) -> Vec<Arc<Route>> {
        self.state.read().routes.routes().to_vec()
    }

    pub fn route(&self, id: &str) -> Option<Arc<Route>> {
        self.state.read().routes.route(id).cloned()
    }

    pub fn variants(&self) -> Vec<Arc<Variant>> {
        self.state.read().routes.variants().cloned().collect()
    }

    pub fn variant(&self, id: &str) -> Option<Arc<Variant>> {
        self.state.read().routes.variant(id).cloned()
    }

    pub fn collections(&self) -> Vec<Arc<Collection>> {
        self.state.read().collections.to_vec()
    }

    pub fn collection(&self, id: &str) -> Option<Arc<Collection>> {
        self.state
            .read()
            .collections
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Id of the collection actually served
    pub fn selected_collection(&self) -> Option<String> {
        self.state.read().selected.clone()
    }

    /// Served route variants, in serving order
    pub fn current_route_variants(&self) -> Vec<Arc<Variant>> {
        self.state.read().current.to_vec()
    }

    /// Ids of the custom route variants, in the order they were set
    pub fn custom_route_variants(&self) -> Vec<String> {
        self.state
            .read()
            .custom
            .iter()
            .map(|custom| custom.id.clone())
            .collect()
    }

    pub fn plain_routes(&self) -> Vec<PlainRoute> {
        self.state
            .read()
            .routes
            .routes()
            .iter()
            .map(|route| route.to_plain())
            .collect()
    }

    pub fn plain_variants(&self) -> Vec<PlainVariant> {
        self.state
            .read()
            .routes
            .variants()
            .map(|variant| variant.to_plain())
            .collect()
    }

    pub fn plain_collections(&self) -> Vec<Collection> {
        self.state
            .read()
            .collections
            .iter()
            .map(|collection| collection.as_ref().clone())
            .collect()
    }

    /// Variant handlers used to validate definitions
    pub fn handlers(&self) -> &Arc<VariantHandlers> {
        &self.handlers
    }
}

impl Drop for Mock {
    fn drop(&mut self) {
        for subscription in self.subscriptions.get_mut().drain(..) {
            subscription.unsubscribe();
        }
    }
}
