//! Normalized routes, variants and collections.

use super::delay::DelaySetting;
use crate::variant_handlers::VariantResponder;
use hyper::Method;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Method a route can be declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    /// `*`, every method
    Any,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Any => "*",
        }
    }

    /// Whether a request with `method` is served. `GET` routes also answer
    /// `HEAD` requests.
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            HttpMethod::Any => true,
            HttpMethod::Get => *method == Method::GET || *method == Method::HEAD,
            other => other.as_str() == method.as_str(),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "TRACE" => Ok(HttpMethod::Trace),
            "*" => Ok(HttpMethod::Any),
            _ => Err(format!("Invalid method \"{s}\"")),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HttpMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Route `method`, kept in the form it was declared with
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RouteMethod {
    One(HttpMethod),
    Many(Vec<HttpMethod>),
}

impl RouteMethod {
    pub fn methods(&self) -> &[HttpMethod] {
        match self {
            RouteMethod::One(method) => std::slice::from_ref(method),
            RouteMethod::Many(methods) => methods,
        }
    }

    pub fn matches(&self, method: &Method) -> bool {
        self.methods().iter().any(|m| m.matches(method))
    }
}

/// One named response of a route
pub struct Variant {
    /// Id inside the route
    pub id: String,
    pub route_id: String,
    pub variant_type: Option<String>,
    pub disabled: bool,
    pub options: Value,
    pub delay: DelaySetting,
    pub preview: Option<Value>,
    pub(crate) responder: Option<Arc<dyn VariantResponder>>,
}

impl Variant {
    /// `routeId:variantId`
    pub fn route_variant_id(&self) -> String {
        route_variant_id(&self.route_id, &self.id)
    }

    pub fn to_plain(&self) -> PlainVariant {
        PlainVariant {
            id: self.route_variant_id(),
            route: self.route_id.clone(),
            variant_type: self.variant_type.clone(),
            disabled: self.disabled,
            preview: self.preview.clone(),
            delay: self.delay,
        }
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variant")
            .field("id", &self.id)
            .field("route_id", &self.route_id)
            .field("variant_type", &self.variant_type)
            .field("disabled", &self.disabled)
            .field("delay", &self.delay)
            .finish()
    }
}

pub fn route_variant_id(route_id: &str, variant_id: &str) -> String {
    format!("{route_id}:{variant_id}")
}

#[derive(Debug)]
pub struct Route {
    pub id: String,
    /// Url pattern in express style (`/users/:id`, `/assets/*`)
    pub url: String,
    pub method: RouteMethod,
    pub delay: Option<u64>,
    /// Valid variants in declaration order
    pub variants: Vec<Arc<Variant>>,
}

impl Route {
    pub fn to_plain(&self) -> PlainRoute {
        PlainRoute {
            id: self.id.clone(),
            url: self.url.clone(),
            method: self.method.clone(),
            delay: self.delay,
            variants: self.variants.iter().map(|v| v.route_variant_id()).collect(),
        }
    }
}

/// Accepted routes, indexed for lookups by route id and `routeId:variantId`.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    by_id: HashMap<String, usize>,
    variants: HashMap<String, Arc<Variant>>,
}

impl RouteTable {
    pub(crate) fn push(&mut self, route: Route) {
        for variant in &route.variants {
            self.variants
                .insert(variant.route_variant_id(), Arc::clone(variant));
        }
        self.by_id.insert(route.id.clone(), self.routes.len());
        self.routes.push(Arc::new(route));
    }

    pub fn contains(&self, route_id: &str) -> bool {
        self.by_id.contains_key(route_id)
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn route(&self, id: &str) -> Option<&Arc<Route>> {
        self.by_id.get(id).map(|&index| &self.routes[index])
    }

    /// Variant by `routeId:variantId`
    pub fn variant(&self, route_variant_id: &str) -> Option<&Arc<Variant>> {
        self.variants.get(route_variant_id)
    }

    /// Every variant, by route and then declaration order
    pub fn variants(&self) -> impl Iterator<Item = &Arc<Variant>> {
        self.routes.iter().flat_map(|route| route.variants.iter())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Valid collection. Serializes as its admin API projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub from: Option<String>,
    /// Route variants declared by the collection itself
    pub defined_routes: Vec<String>,
    /// Route variants after applying the `from` chain
    pub routes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlainRoute {
    pub id: String,
    pub url: String,
    pub method: RouteMethod,
    pub delay: Option<u64>,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlainVariant {
    pub id: String,
    pub route: String,
    #[serde(rename = "type")]
    pub variant_type: Option<String>,
    pub disabled: bool,
    pub preview: Option<Value>,
    #[serde(skip_serializing_if = "DelaySetting::is_inherit")]
    pub delay: DelaySetting,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>(), Ok(HttpMethod::Get));
        assert_eq!("Patch".parse::<HttpMethod>(), Ok(HttpMethod::Patch));
        assert_eq!("*".parse::<HttpMethod>(), Ok(HttpMethod::Any));
        assert!("FETCH".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_method_matching() {
        assert!(HttpMethod::Get.matches(&Method::HEAD));
        assert!(!HttpMethod::Post.matches(&Method::GET));
        assert!(HttpMethod::Any.matches(&Method::DELETE));

        let many = RouteMethod::Many(vec![HttpMethod::Put, HttpMethod::Patch]);
        assert!(many.matches(&Method::PATCH));
        assert!(!many.matches(&Method::GET));
    }

    #[test]
    fn test_plain_variant_projection() {
        let variant = Variant {
            id: "success".to_string(),
            route_id: "get-user".to_string(),
            variant_type: Some("json".to_string()),
            disabled: false,
            options: json!({}),
            delay: DelaySetting::Inherit,
            preview: Some(json!({"status": 200})),
            responder: None,
        };

        assert_eq!(
            serde_json::to_value(variant.to_plain()).unwrap(),
            json!({
                "id": "get-user:success",
                "route": "get-user",
                "type": "json",
                "disabled": false,
                "preview": {"status": 200}
            })
        );
    }

    #[test]
    fn test_route_method_keeps_declared_form() {
        assert_eq!(
            serde_json::to_value(RouteMethod::One(HttpMethod::Get)).unwrap(),
            json!("GET")
        );
        assert_eq!(
            serde_json::to_value(RouteMethod::Many(vec![HttpMethod::Get])).unwrap(),
            json!(["GET"])
        );
    }
}
