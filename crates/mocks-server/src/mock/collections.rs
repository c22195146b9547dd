//! Collection resolution and selection.
//!
//! Collections are processed strictly in declaration order, so `from` can
//! only point to a collection accepted earlier. A collection with any
//! invalid reference is dropped as a whole. Each accepted collection carries
//! the route variants it declares and the ones it ends up serving once its
//! `from` chain is applied.

use super::types::{Collection, RouteTable};
use crate::alerts::Alerts;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CollectionDefinition {
    id: String,
    #[serde(default)]
    from: Option<String>,
    #[serde(default, alias = "routeVariants", alias = "routesVariants")]
    routes: Vec<String>,
}

fn label(definition: &Value, index: usize) -> String {
    match definition.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => index.to_string(),
    }
}

fn parse_collection(definition: &Value) -> Result<CollectionDefinition, String> {
    let collection: CollectionDefinition =
        serde_json::from_value(definition.clone()).map_err(|e| e.to_string())?;
    if collection.id.is_empty() {
        return Err("id can not be empty".to_string());
    }
    Ok(collection)
}

/// `base` with every entry of `own` applied: an entry replaces the one of the
/// same route in place, or is appended when the route is not in `base`.
fn merge_route_variants(base: &[String], own: &[String], routes: &RouteTable) -> Vec<String> {
    let route_of = |id: &str| routes.variant(id).map(|variant| variant.route_id.clone());
    let mut merged: Vec<(Option<String>, String)> = base
        .iter()
        .map(|id| (route_of(id), id.clone()))
        .collect();

    for id in own {
        let route_id = route_of(id);
        match merged.iter_mut().find(|(existing, _)| *existing == route_id) {
            Some(entry) => entry.1 = id.clone(),
            None => merged.push((route_id, id.clone())),
        }
    }

    merged.into_iter().map(|(_, id)| id).collect()
}

/// Validate `definitions` against `routes` and resolve inheritance.
///
/// `alerts` is the collections namespace. Per collection alerts live under
/// `load:<id>`; `load` itself holds the count of rejected collections.
pub fn load_collections(
    definitions: &[Value],
    routes: &RouteTable,
    alerts: &Alerts,
) -> Vec<Arc<Collection>> {
    let load_alerts = alerts.collection("load");
    load_alerts.clean();

    let mut collections: Vec<Arc<Collection>> = Vec::new();
    let mut errors = 0usize;

    for (index, definition) in definitions.iter().enumerate() {
        let collection = match parse_collection(definition) {
            Ok(collection) => collection,
            Err(message) => {
                let id = label(definition, index);
                load_alerts.set(
                    &format!("{id}:validation"),
                    format!("Collection with id \"{id}\" is invalid: {message}"),
                    None,
                );
                errors += 1;
                continue;
            }
        };
        let id = collection.id.as_str();

        if collections.iter().any(|c| c.id == id) {
            load_alerts.set(
                &format!("{id}:duplicated"),
                format!("Collection with duplicated id \"{id}\" detected. It has been ignored"),
                None,
            );
            errors += 1;
            continue;
        }

        let base = match &collection.from {
            Some(from) => match collections.iter().find(|c| &c.id == from) {
                Some(base) => Some(Arc::clone(base)),
                None => {
                    load_alerts.set(
                        &format!("{id}:from"),
                        format!(
                            "Collection with id \"{id}\" is invalid: Collection with id \"{from}\" was not found. It can only extend collections defined before it"
                        ),
                        None,
                    );
                    errors += 1;
                    continue;
                }
            },
            None => None,
        };

        let missing: Vec<&str> = collection
            .routes
            .iter()
            .filter(|route_variant| routes.variant(route_variant).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            load_alerts.set(
                &format!("{id}:variants"),
                format!(
                    "Collection with id \"{id}\" is invalid: Route variants not found: \"{}\"",
                    missing.join("\", \"")
                ),
                None,
            );
            errors += 1;
            continue;
        }

        let mut seen_routes = HashSet::new();
        let repeated = collection.routes.iter().find_map(|route_variant| {
            let route_id = routes.variant(route_variant)?.route_id.as_str();
            (!seen_routes.insert(route_id)).then_some(route_id)
        });
        if let Some(route_id) = repeated {
            load_alerts.set(
                &format!("{id}:variants"),
                format!(
                    "Collection with id \"{id}\" is invalid: route \"{route_id}\" is used more than once in the same collection"
                ),
                None,
            );
            errors += 1;
            continue;
        }

        let effective = match &base {
            Some(base) => merge_route_variants(&base.routes, &collection.routes, routes),
            None => collection.routes.clone(),
        };

        collections.push(Arc::new(Collection {
            id: collection.id.clone(),
            from: collection.from.clone(),
            defined_routes: collection.routes,
            routes: effective,
        }));
    }

    if errors > 0 {
        alerts.set(
            "load",
            format!("Critical errors found while loading collections: {errors}"),
            None,
        );
    }

    debug!(collections = collections.len(), rejected = errors, "Collections loaded");
    collections
}

/// Pick the collection to serve, falling back to the first one when the
/// requested id is unset or unknown.
pub fn select_collection<'a>(
    collections: &'a [Arc<Collection>],
    selected: Option<&str>,
    alerts: &Alerts,
) -> Option<&'a Arc<Collection>> {
    let Some(first) = collections.first() else {
        alerts.remove("selected");
        alerts.set("empty", "No collections found", None);
        return None;
    };
    alerts.remove("empty");

    match selected {
        None => {
            alerts.set(
                "selected",
                "Option \"mock.collections.selected\" was not defined. Selecting the first collection found",
                None,
            );
            Some(first)
        }
        Some(id) => match collections.iter().find(|c| c.id == id) {
            Some(collection) => {
                alerts.remove("selected");
                Some(collection)
            }
            None => {
                alerts.set(
                    "selected",
                    format!("Collection \"{id}\" was not found. Selecting the first collection found"),
                    None,
                );
                Some(first)
            }
        },
    }
}
