//! `type: static`, serves a folder below the route url.

use super::file::content_type_for;
use super::{
    header_map, parse_options, MockRequest, Mount, VariantHandler, VariantResponder,
    WILDCARD_PARAM,
};
use crate::response::{not_found, MockResponse, ResponseBuilder};
use async_trait::async_trait;
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

fn default_index() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct StaticOptions {
    path: PathBuf,
    #[serde(default, deserialize_with = "header_map")]
    headers: BTreeMap<String, String>,
    /// Serve `index.html` for folder requests
    #[serde(default = "default_index")]
    index: bool,
}

pub struct StaticHandler;

impl VariantHandler for StaticHandler {
    fn id(&self) -> &str {
        "static"
    }

    fn build(&self, options: &Value) -> Result<Arc<dyn VariantResponder>, String> {
        let options: StaticOptions = parse_options(options)?;
        if options.path.as_os_str().is_empty() {
            return Err("Invalid options: path can not be empty".to_string());
        }
        Ok(Arc::new(StaticResponder { options }))
    }
}

struct StaticResponder {
    options: StaticOptions,
}

impl StaticResponder {
    /// File under the root for the captured wildcard, `None` when the request
    /// tries to leave the root.
    fn resolve(&self, wildcard: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(wildcard).ok()?;
        let mut path = self.options.path.clone();
        for segment in decoded.split('/').filter(|s| !s.is_empty() && *s != ".") {
            if segment == ".." || segment.contains('\\') {
                return None;
            }
            path.push(segment);
        }
        Some(path)
    }

    async fn read(&self, path: &Path) -> Option<(Vec<u8>, PathBuf)> {
        let metadata = tokio::fs::metadata(path).await.ok()?;
        let path = if metadata.is_dir() {
            if !self.options.index {
                return None;
            }
            path.join("index.html")
        } else {
            path.to_path_buf()
        };
        let contents = tokio::fs::read(&path).await.ok()?;
        Some((contents, path))
    }
}

#[async_trait]
impl VariantResponder for StaticResponder {
    async fn respond(&self, request: &MockRequest) -> MockResponse {
        let wildcard = request.param(WILDCARD_PARAM).unwrap_or_default();
        let Some(path) = self.resolve(wildcard) else {
            debug!(path = request.path(), "Rejected static path");
            return not_found();
        };

        match self.read(&path).await {
            Some((contents, served)) => ResponseBuilder::new(StatusCode::OK)
                .headers(&self.options.headers)
                .default_content_type(content_type_for(&served))
                .body(contents)
                .build(),
            None => not_found(),
        }
    }

    fn mount(&self) -> Mount {
        Mount::Prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant_handlers::test_support::{body_string, request};
    use hyper::Method;
    use serde_json::json;

    fn static_request(wildcard: &str) -> MockRequest {
        let mut req = request(Method::GET, "/web/x");
        req.params
            .insert(WILDCARD_PARAM.to_string(), wildcard.to_string());
        req
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_serves_nested_files() {
        let dir = fixture();
        let responder = StaticHandler.build(&json!({"path": dir.path()})).unwrap();
        assert_eq!(responder.mount(), Mount::Prefix);

        let response = responder.respond(&static_request("css/site.css")).await;
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/css; charset=utf-8"
        );
        assert_eq!(body_string(response).await, "body{}");
    }

    #[tokio::test]
    async fn test_folder_serves_index() {
        let dir = fixture();
        let responder = StaticHandler.build(&json!({"path": dir.path()})).unwrap();
        let response = responder.respond(&static_request("")).await;
        assert_eq!(body_string(response).await, "<h1>home</h1>");

        let no_index = StaticHandler
            .build(&json!({"path": dir.path(), "index": false}))
            .unwrap();
        assert_eq!(no_index.respond(&static_request("")).await.status(), 404);
    }

    #[tokio::test]
    async fn test_parent_segments_are_rejected() {
        let dir = fixture();
        let responder = StaticHandler
            .build(&json!({"path": dir.path().join("css")}))
            .unwrap();
        let response = responder.respond(&static_request("../index.html")).await;
        assert_eq!(response.status(), 404);
        let encoded = responder.respond(&static_request("%2E%2E/index.html")).await;
        assert_eq!(encoded.status(), 404);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = fixture();
        let responder = StaticHandler.build(&json!({"path": dir.path()})).unwrap();
        assert_eq!(responder.respond(&static_request("nope.js")).await.status(), 404);
    }
}
