//! Variant handlers: what a route variant does when it is served.
//!
//! A variant declares a `type` and handler-specific `options`. The registry
//! maps the type to a [`VariantHandler`], which validates the options, builds
//! the [`VariantResponder`] mounted on the server, and offers a side-effect
//! free preview of the response for the admin API.
//!
//! Built-in types: `json`, `text`, `status`, `file`, `static` and
//! `middleware`. More can be registered at startup.

mod file;
mod json;
mod middleware;
mod static_files;
mod status;
mod text;

use crate::response::MockResponse;
use async_trait::async_trait;
use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, StatusCode, Uri};
use parking_lot::RwLock;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

pub use file::FileHandler;
pub use json::JsonHandler;
pub use middleware::{Middleware, MiddlewareHandler, Middlewares};
pub use static_files::StaticHandler;
pub use status::StatusHandler;
pub use text::TextHandler;

/// Name of the catch-all parameter captured by prefix-mounted responders
pub const WILDCARD_PARAM: &str = "mocks_wildcard";

/// Request handed to responders
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Path parameters captured by the route url (`/users/:id`)
    pub params: HashMap<String, String>,
    pub body: Bytes,
}

impl MockRequest {
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// How a responder is mounted on its route url
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mount {
    /// Only the url itself
    Exact,
    /// The url and everything below it
    Prefix,
}

/// Mounted behavior of one variant
#[async_trait]
pub trait VariantResponder: Send + Sync {
    async fn respond(&self, request: &MockRequest) -> MockResponse;

    fn mount(&self) -> Mount {
        Mount::Exact
    }
}

/// Descriptor of one variant `type`
pub trait VariantHandler: Send + Sync {
    /// Value of the variant `type` property handled by this handler
    fn id(&self) -> &str;

    /// Build the responder for `options`. `Err` carries a human readable
    /// description of why the options are invalid.
    fn build(&self, options: &Value) -> Result<Arc<dyn VariantResponder>, String>;

    /// Check `options` without keeping the responder
    fn validate(&self, options: &Value) -> Result<(), String> {
        self.build(options).map(|_| ())
    }

    /// Static preview of the response, or `None` when it can not be known
    /// without serving a request. Must not touch the disk or run user code.
    fn preview(&self, _options: &Value) -> Option<Value> {
        None
    }
}

/// Deserialize handler options into their typed form
pub fn parse_options<T: DeserializeOwned>(options: &Value) -> Result<T, String> {
    serde_json::from_value(options.clone()).map_err(|e| format!("Invalid options: {e}"))
}

/// `status` option. Rejects codes outside 100..=999.
pub fn status_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    let code = u16::deserialize(deserializer)?;
    StatusCode::from_u16(code)
        .map(|status| status.as_u16())
        .map_err(|_| D::Error::custom(format!("invalid status code {code}")))
}

/// `headers` option. Names and values must be valid HTTP headers.
pub fn header_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error> {
    let headers = BTreeMap::<String, String>::deserialize(deserializer)?;
    for (name, value) in &headers {
        HeaderName::from_str(name)
            .map_err(|_| D::Error::custom(format!("invalid header name \"{name}\"")))?;
        HeaderValue::from_str(value)
            .map_err(|_| D::Error::custom(format!("invalid value for header \"{name}\"")))?;
    }
    Ok(headers)
}

/// Registry of variant handlers, keyed by `type`.
pub struct VariantHandlers {
    handlers: RwLock<Vec<Arc<dyn VariantHandler>>>,
    middlewares: Middlewares,
}

impl VariantHandlers {
    /// Registry with every built-in handler
    pub fn with_defaults(middlewares: Middlewares) -> Self {
        let registry = Self {
            handlers: RwLock::new(Vec::new()),
            middlewares: middlewares.clone(),
        };
        registry.register(Arc::new(JsonHandler));
        registry.register(Arc::new(TextHandler));
        registry.register(Arc::new(StatusHandler));
        registry.register(Arc::new(FileHandler));
        registry.register(Arc::new(StaticHandler));
        registry.register(Arc::new(MiddlewareHandler::new(middlewares)));
        registry
    }

    /// Register a handler. A handler with the same id is replaced.
    pub fn register(&self, handler: Arc<dyn VariantHandler>) {
        let mut handlers = self.handlers.write();
        match handlers.iter_mut().find(|h| h.id() == handler.id()) {
            Some(existing) => {
                warn!(
                    handler = handler.id(),
                    "Variant handler already registered, replacing it"
                );
                *existing = handler;
            }
            None => handlers.push(handler),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn VariantHandler>> {
        self.handlers.read().iter().find(|h| h.id() == id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.handlers.read().iter().map(|h| h.id().to_string()).collect()
    }

    /// Named middlewares used by the `middleware` handler
    pub fn middlewares(&self) -> &Middlewares {
        &self.middlewares
    }
}

impl Default for VariantHandlers {
    fn default() -> Self {
        Self::with_defaults(Middlewares::new())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Teapot;

    impl VariantHandler for Teapot {
        fn id(&self) -> &str {
            "json"
        }

        fn build(&self, _options: &Value) -> Result<Arc<dyn VariantResponder>, String> {
            Err("always invalid".to_string())
        }
    }

    #[test]
    fn test_default_registry_ids() {
        let registry = VariantHandlers::default();
        assert_eq!(
            registry.ids(),
            vec!["json", "text", "status", "file", "static", "middleware"]
        );
        assert!(registry.get("json").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_register_replaces_same_id() {
        let registry = VariantHandlers::default();
        registry.register(Arc::new(Teapot));

        assert_eq!(registry.ids().len(), 6);
        let handler = registry.get("json").unwrap();
        assert!(handler
            .validate(&json!({"status": 200, "body": {}}))
            .is_err());
    }

    #[test]
    fn test_parse_options_reports_field() {
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Options {
            status: u16,
        }
        let err = parse_options::<Options>(&json!({})).unwrap_err();
        assert!(err.contains("status"), "{err}");
    }

    #[test]
    fn test_status_and_headers_are_checked() {
        let handlers = VariantHandlers::default();
        for id in ["json", "text", "status", "file"] {
            let handler = handlers.get(id).unwrap();
            let err = handler
                .validate(&json!({"status": 1000, "body": "x", "path": "a.txt"}))
                .unwrap_err();
            assert!(err.contains("invalid status code 1000"), "{id}: {err}");
        }

        let json_handler = handlers.get("json").unwrap();
        let err = json_handler
            .validate(&json!({"status": 200, "body": {}, "headers": {"bad header": "x"}}))
            .unwrap_err();
        assert!(err.contains("invalid header name"), "{err}");

        let err = json_handler
            .validate(&json!({"status": 200, "body": {}, "headers": {"x-ok": "line\nbreak"}}))
            .unwrap_err();
        assert!(err.contains("invalid value for header"), "{err}");

        let err = handlers
            .get("static")
            .unwrap()
            .validate(&json!({"path": "public", "headers": {"": "x"}}))
            .unwrap_err();
        assert!(err.contains("invalid header name"), "{err}");

        assert!(json_handler
            .validate(&json!({"status": 299, "body": {}, "headers": {"x-custom": "1"}}))
            .is_ok());
    }

    #[test]
    fn test_request_helpers() {
        let mut request = test_support::request(Method::POST, "/users/1?full=true");
        request.params.insert("id".to_string(), "1".to_string());
        request.body = Bytes::from_static(br#"{"name":"x"}"#);

        assert_eq!(request.path(), "/users/1");
        assert_eq!(request.query(), Some("full=true"));
        assert_eq!(request.param("id"), Some("1"));
        let body: Value = request.json().unwrap();
        assert_eq!(body["name"], "x");
    }
}
