//! `type: middleware`, delegates to code registered by name.

use super::{parse_options, MockRequest, VariantHandler, VariantResponder};
use crate::response::MockResponse;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Request handler registered in code and referenced from variant options
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, request: &MockRequest) -> MockResponse;
}

#[async_trait]
impl<F> Middleware for F
where
    F: Fn(&MockRequest) -> MockResponse + Send + Sync,
{
    async fn handle(&self, request: &MockRequest) -> MockResponse {
        self(request)
    }
}

/// Named middlewares shared by the server builder and the handler
#[derive(Clone, Default)]
pub struct Middlewares {
    entries: Arc<RwLock<HashMap<String, Arc<dyn Middleware>>>>,
}

impl Middlewares {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, middleware: Arc<dyn Middleware>) {
        self.entries.write().insert(name.into(), middleware);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.entries.read().get(name).cloned()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MiddlewareOptions {
    middleware: String,
}

pub struct MiddlewareHandler {
    middlewares: Middlewares,
}

impl MiddlewareHandler {
    pub fn new(middlewares: Middlewares) -> Self {
        Self { middlewares }
    }
}

impl VariantHandler for MiddlewareHandler {
    fn id(&self) -> &str {
        "middleware"
    }

    fn build(&self, options: &Value) -> Result<Arc<dyn VariantResponder>, String> {
        let options: MiddlewareOptions = parse_options(options)?;
        let middleware = self
            .middlewares
            .get(&options.middleware)
            .ok_or_else(|| format!("Middleware \"{}\" is not registered", options.middleware))?;
        Ok(Arc::new(MiddlewareResponder { middleware }))
    }
}

struct MiddlewareResponder {
    middleware: Arc<dyn Middleware>,
}

#[async_trait]
impl VariantResponder for MiddlewareResponder {
    async fn respond(&self, request: &MockRequest) -> MockResponse {
        self.middleware.handle(request).await
    }
}
