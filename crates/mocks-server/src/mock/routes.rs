//! Route and variant validation.
//!
//! Turns raw route definitions into a [`RouteTable`]. Nothing here fails:
//! invalid or duplicated entries are dropped and reported as alerts under
//! `routes:load`, and whatever is well formed is kept.

use super::delay::DelaySetting;
use super::types::{HttpMethod, Route, RouteMethod, RouteTable, Variant};
use crate::alerts::Alerts;
use crate::variant_handlers::VariantHandlers;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MethodDefinition {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RouteDefinition {
    id: String,
    url: String,
    method: MethodDefinition,
    #[serde(default)]
    delay: Option<u64>,
    variants: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct VariantDefinition {
    id: String,
    #[serde(rename = "type", default)]
    variant_type: Option<String>,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    options: Value,
    #[serde(default)]
    delay: DelaySetting,
}

/// Id used in alerts for an entry that may not even have a valid id
fn label(definition: &Value, index: usize) -> String {
    match definition.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => index.to_string(),
    }
}

fn parse_method(definition: &MethodDefinition) -> Result<RouteMethod, String> {
    match definition {
        MethodDefinition::One(method) => method.parse().map(RouteMethod::One),
        MethodDefinition::Many(methods) => {
            if methods.is_empty() {
                return Err("method can not be an empty list".to_string());
            }
            let mut parsed: Vec<HttpMethod> = Vec::with_capacity(methods.len());
            for method in methods {
                let method: HttpMethod = method.parse()?;
                if parsed.contains(&method) {
                    return Err(format!("method \"{method}\" is repeated"));
                }
                parsed.push(method);
            }
            Ok(RouteMethod::Many(parsed))
        }
    }
}

fn parse_route(definition: &Value) -> Result<(RouteDefinition, RouteMethod), String> {
    let route: RouteDefinition =
        serde_json::from_value(definition.clone()).map_err(|e| e.to_string())?;
    if route.id.is_empty() {
        return Err("id can not be empty".to_string());
    }
    if route.url.is_empty() {
        return Err("url can not be empty".to_string());
    }
    let method = parse_method(&route.method)?;
    Ok((route, method))
}

fn build_variant(
    route_id: &str,
    definition: &Value,
    handlers: &VariantHandlers,
) -> Result<Variant, String> {
    let variant: VariantDefinition =
        serde_json::from_value(definition.clone()).map_err(|e| e.to_string())?;
    if variant.id.is_empty() {
        return Err("id can not be empty".to_string());
    }

    let (responder, preview) = if variant.disabled {
        (None, None)
    } else {
        let variant_type = variant
            .variant_type
            .as_deref()
            .ok_or_else(|| "type is required unless the variant is disabled".to_string())?;
        let handler = handlers
            .get(variant_type)
            .ok_or_else(|| format!("Invalid variant type \"{variant_type}\""))?;
        let responder = handler.build(&variant.options)?;
        (Some(responder), handler.preview(&variant.options))
    };

    Ok(Variant {
        id: variant.id,
        route_id: route_id.to_string(),
        variant_type: variant.variant_type,
        disabled: variant.disabled,
        options: variant.options,
        delay: variant.delay,
        preview,
        responder,
    })
}

/// Validate `definitions` in order and build the route table.
///
/// `alerts` is the routes namespace; its `load` and `empty` alerts are
/// replaced on every call.
pub fn load_routes(definitions: &[Value], handlers: &VariantHandlers, alerts: &Alerts) -> RouteTable {
    let load_alerts = alerts.collection("load");
    load_alerts.clean();

    let mut table = RouteTable::default();

    for (index, definition) in definitions.iter().enumerate() {
        let (route, method) = match parse_route(definition) {
            Ok(parsed) => parsed,
            Err(message) => {
                let id = label(definition, index);
                load_alerts.set(
                    &format!("{id}:validation"),
                    format!("Route with id \"{id}\" is invalid: {message}"),
                    None,
                );
                continue;
            }
        };

        if table.contains(&route.id) {
            load_alerts.set(
                &format!("{}:duplicated", route.id),
                format!(
                    "Route with duplicated id \"{}\" detected. It has been ignored",
                    route.id
                ),
                None,
            );
            continue;
        }

        let mut variant_ids = HashSet::new();
        let mut variants = Vec::with_capacity(route.variants.len());
        for (variant_index, variant_definition) in route.variants.iter().enumerate() {
            let variant_label = label(variant_definition, variant_index);
            let alert_prefix = format!("{}:variants:{variant_label}", route.id);

            if let Some(id) = variant_definition.get("id").and_then(Value::as_str) {
                if !variant_ids.insert(id.to_string()) {
                    load_alerts.set(
                        &format!("{alert_prefix}:duplicated"),
                        format!(
                            "Route variant with duplicated id \"{id}\" detected in route \"{}\". It has been ignored",
                            route.id
                        ),
                        None,
                    );
                    continue;
                }
            }

            match build_variant(&route.id, variant_definition, handlers) {
                Ok(variant) => variants.push(Arc::new(variant)),
                Err(message) => load_alerts.set(
                    &format!("{alert_prefix}:validation"),
                    format!(
                        "Variant with id \"{}\" in route \"{}\" is invalid: {message}",
                        variant_label, route.id
                    ),
                    None,
                ),
            }
        }

        table.push(Route {
            id: route.id,
            url: route.url,
            method,
            delay: route.delay,
            variants,
        });
    }

    if table.is_empty() {
        alerts.set("empty", "No routes found", None);
    } else {
        alerts.remove("empty");
    }

    debug!(routes = table.len(), "Routes loaded");
    table
}
