//! Routing table built from the currently served route variants.
//!
//! Route urls use express syntax (`/users/:id`, `/files/*`) and are
//! converted to `matchit` patterns. Routes sharing a url share one trie
//! entry; their variants are tried in serving order and the first one whose
//! route accepts the request method wins. A table is immutable once built:
//! the mock swaps whole tables, so a request always sees one consistent
//! version.

use super::delay::resolve_delay;
use super::types::{Route, RouteTable, Variant};
use crate::alerts::Alerts;
use crate::variant_handlers::{Mount, VariantResponder, WILDCARD_PARAM};
use hyper::Method;
use matchit::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One variant mounted on its route url
pub struct MountedRoute {
    pub route: Arc<Route>,
    pub variant: Arc<Variant>,
    pub(crate) responder: Arc<dyn VariantResponder>,
}

impl MountedRoute {
    pub fn responder(&self) -> &Arc<dyn VariantResponder> {
        &self.responder
    }

    /// Milliseconds to wait before responding, given the global delay
    pub fn delay(&self, global: u64) -> u64 {
        resolve_delay(self.variant.delay, self.route.delay, global)
    }
}

/// Result of a successful lookup
pub struct RouteMatch {
    pub mounted: Arc<MountedRoute>,
    pub params: HashMap<String, String>,
}

pub struct MountedRoutes {
    router: Router<usize>,
    entries: Vec<Vec<Arc<MountedRoute>>>,
    mounted: usize,
}

/// Express style url to a `matchit` pattern
fn convert_url(url: &str) -> String {
    let mut pattern = String::with_capacity(url.len() + 8);
    let mut chars = url.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ':' if pattern.ends_with('/') => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    pattern.push(':');
                } else {
                    pattern.push('{');
                    pattern.push_str(&name);
                    pattern.push('}');
                }
            }
            '*' => {
                pattern.push_str("{*");
                pattern.push_str(WILDCARD_PARAM);
                pattern.push('}');
            }
            '{' => pattern.push_str("{{"),
            '}' => pattern.push_str("}}"),
            other => pattern.push(other),
        }
    }
    pattern
}

/// Patterns a route is inserted with
fn patterns(url: &str, mount: Mount) -> Vec<String> {
    let exact = convert_url(url);
    match mount {
        Mount::Exact => vec![exact],
        Mount::Prefix if exact.contains("{*") => vec![exact],
        Mount::Prefix => {
            let base = exact.trim_end_matches('/');
            let root = if base.is_empty() { "/".to_string() } else { base.to_string() };
            vec![root, format!("{base}/{{*{WILDCARD_PARAM}}}")]
        }
    }
}

impl MountedRoutes {
    pub fn empty() -> Self {
        Self {
            router: Router::new(),
            entries: Vec::new(),
            mounted: 0,
        }
    }

    /// Build the table for `current`, in serving order. Disabled variants
    /// are left unmounted. Urls that can not be mounted are reported under
    /// `alerts` (the router namespace), which is cleaned first.
    pub fn build(current: &[Arc<Variant>], routes: &RouteTable, alerts: &Alerts) -> Self {
        alerts.clean();

        let mut table = Self::empty();
        let mut slots: Vec<String> = Vec::new();

        for variant in current {
            let Some(route) = routes.route(&variant.route_id) else {
                continue;
            };
            let Some(responder) = variant.responder.clone() else {
                debug!(route = %route.id, variant = %variant.id, "Variant disabled, route not mounted");
                continue;
            };

            let mounted = Arc::new(MountedRoute {
                route: Arc::clone(route),
                variant: Arc::clone(variant),
                responder,
            });

            let mut inserted = false;
            for pattern in patterns(&route.url, mounted.responder.mount()) {
                if let Some(slot) = slots.iter().position(|p| *p == pattern) {
                    table.entries[slot].push(Arc::clone(&mounted));
                    inserted = true;
                    continue;
                }
                let slot = table.entries.len();
                match table.router.insert(pattern.clone(), slot) {
                    Ok(()) => {
                        slots.push(pattern);
                        table.entries.push(vec![Arc::clone(&mounted)]);
                        inserted = true;
                    }
                    Err(e) => alerts.set(
                        &route.id,
                        format!("Route with id \"{}\" could not be mounted on url \"{}\": {e}", route.id, route.url),
                        None,
                    ),
                }
            }
            if inserted {
                table.mounted += 1;
            }
        }

        debug!(mounted = table.mounted, "Routes mounted");
        table
    }

    /// Variant serving `method` and `path`, if any. A trailing slash is
    /// ignored when the exact path is not mounted.
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.find_exact(method, path).or_else(|| {
            let trimmed = path.trim_end_matches('/');
            (trimmed.len() != path.len() && !trimmed.is_empty())
                .then(|| self.find_exact(method, trimmed))
                .flatten()
        })
    }

    fn find_exact(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let matched = self.router.at(path).ok()?;
        let mounted = self.entries[*matched.value]
            .iter()
            .find(|mounted| mounted.route.method.matches(method))?;
        let params = matched
            .params
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Some(RouteMatch {
            mounted: Arc::clone(mounted),
            params,
        })
    }

    /// Number of mounted route variants
    pub fn len(&self) -> usize {
        self.mounted
    }

    pub fn is_empty(&self) -> bool {
        self.mounted == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::routes::load_routes;
    use crate::variant_handlers::VariantHandlers;
    use serde_json::json;

    fn table() -> RouteTable {
        let status = |id: &str, status: u16| {
            json!({"id": id, "type": "status", "options": {"status": status}})
        };
        let routes = vec![
            json!({"id": "get-user", "url": "/api/users/:id", "method": "GET",
                   "variants": [status("ok", 200), status("missing", 404)]}),
            json!({"id": "update-user", "url": "/api/users/:id", "method": ["PUT", "PATCH"],
                   "variants": [status("ok", 204)]}),
            json!({"id": "any", "url": "/api/*", "method": "*",
                   "variants": [status("ok", 418), {"id": "off", "disabled": true}]}),
            json!({"id": "web", "url": "/web", "method": "GET",
                   "variants": [{"id": "files", "type": "static", "options": {"path": "public"}}]}),
            json!({"id": "clash", "url": "/api/users/:name", "method": "DELETE",
                   "variants": [status("ok", 200)]}),
        ];
        load_routes(&routes, &VariantHandlers::default(), &Alerts::new())
    }

    fn current(routes: &RouteTable, ids: &[&str]) -> Vec<Arc<Variant>> {
        ids.iter().map(|id| Arc::clone(routes.variant(id).unwrap())).collect()
    }

    #[test]
    fn test_convert_url() {
        assert_eq!(convert_url("/users/:id"), "/users/{id}");
        assert_eq!(convert_url("/a/:x/b/:y_z"), "/a/{x}/b/{y_z}");
        assert_eq!(convert_url("/files/*"), "/files/{*mocks_wildcard}");
        assert_eq!(convert_url("/time:now"), "/time:now");
        assert_eq!(convert_url("/{raw}"), "/{{raw}}");
    }

    #[test]
    fn test_prefix_patterns() {
        assert_eq!(
            patterns("/web/", Mount::Prefix),
            vec!["/web".to_string(), "/web/{*mocks_wildcard}".to_string()]
        );
        assert_eq!(
            patterns("/", Mount::Prefix),
            vec!["/".to_string(), "/{*mocks_wildcard}".to_string()]
        );
    }

    #[test]
    fn test_find_by_method_and_params() {
        let routes = table();
        let alerts = Alerts::new();
        let mounted = MountedRoutes::build(
            &current(&routes, &["get-user:missing", "update-user:ok", "any:ok"]),
            &routes,
            &alerts,
        );
        assert_eq!(mounted.len(), 3);

        let found = mounted.find(&Method::GET, "/api/users/7").unwrap();
        assert_eq!(found.mounted.variant.route_variant_id(), "get-user:missing");
        assert_eq!(found.params.get("id").map(String::as_str), Some("7"));

        let found = mounted.find(&Method::PATCH, "/api/users/7").unwrap();
        assert_eq!(found.mounted.route.id, "update-user");

        let found = mounted.find(&Method::POST, "/api/anything/else").unwrap();
        assert_eq!(found.mounted.route.id, "any");

        assert!(mounted.find(&Method::POST, "/api/users/7").is_none());
        assert!(mounted.find(&Method::GET, "/other").is_none());
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let routes = table();
        let mounted =
            MountedRoutes::build(&current(&routes, &["get-user:ok"]), &routes, &Alerts::new());
        let found = mounted.find(&Method::GET, "/api/users/7/").unwrap();
        assert_eq!(found.params.get("id").map(String::as_str), Some("7"));
    }

    #[test]
    fn test_disabled_variant_is_not_mounted() {
        let routes = table();
        let mounted =
            MountedRoutes::build(&current(&routes, &["any:off"]), &routes, &Alerts::new());
        assert!(mounted.is_empty());
        assert!(mounted.find(&Method::GET, "/api/x").is_none());
    }

    #[test]
    fn test_prefix_mount() {
        let routes = table();
        let mounted =
            MountedRoutes::build(&current(&routes, &["web:files"]), &routes, &Alerts::new());

        let found = mounted.find(&Method::GET, "/web/css/site.css").unwrap();
        assert_eq!(
            found.params.get(WILDCARD_PARAM).map(String::as_str),
            Some("css/site.css")
        );
        assert!(mounted.find(&Method::GET, "/web").is_some());
    }

    #[test]
    fn test_conflicting_url_is_alerted() {
        let routes = table();
        let alerts = Alerts::new();
        let mounted = MountedRoutes::build(
            &current(&routes, &["get-user:ok", "clash:ok"]),
            &routes,
            &alerts,
        );

        assert_eq!(mounted.len(), 1);
        assert!(alerts.find("clash").is_some());
    }

    #[test]
    fn test_delay_resolution() {
        let routes = table();
        let mounted =
            MountedRoutes::build(&current(&routes, &["get-user:ok"]), &routes, &Alerts::new());
        let found = mounted.find(&Method::GET, "/api/users/1").unwrap();
        assert_eq!(found.mounted.delay(300), 300);
    }
}
