use super::{
    header_map, parse_options, status_code, MockRequest, VariantHandler, VariantResponder,
};
use crate::response::{error_response, MockResponse, ResponseBuilder};
use async_trait::async_trait;
use hyper::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileOptions {
    #[serde(deserialize_with = "status_code")]
    status: u16,
    #[serde(default, deserialize_with = "header_map")]
    headers: BTreeMap<String, String>,
    path: PathBuf,
}

/// `type: file`, responds with the contents of a file read on every request
pub struct FileHandler;

impl VariantHandler for FileHandler {
    fn id(&self) -> &str {
        "file"
    }

    fn build(&self, options: &Value) -> Result<Arc<dyn VariantResponder>, String> {
        let options: FileOptions = parse_options(options)?;
        if options.path.as_os_str().is_empty() {
            return Err("Invalid options: path can not be empty".to_string());
        }
        Ok(Arc::new(FileResponder { options }))
    }
}

struct FileResponder {
    options: FileOptions,
}

#[async_trait]
impl VariantResponder for FileResponder {
    async fn respond(&self, _request: &MockRequest) -> MockResponse {
        match tokio::fs::read(&self.options.path).await {
            Ok(contents) => ResponseBuilder::with_status_code(self.options.status)
                .headers(&self.options.headers)
                .default_content_type(content_type_for(&self.options.path))
                .body(contents)
                .build(),
            Err(e) => {
                warn!(path = %self.options.path.display(), error = %e, "Could not read response file");
                error_response(StatusCode::NOT_FOUND, "File not found")
            }
        }
    }
}

/// Content type guessed from the file extension
pub(crate) fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("json") => "application/json; charset=utf-8",
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("csv") => "text/csv; charset=utf-8",
        Some("xml") => "application/xml",
        Some("yaml") | Some("yml") => "application/yaml",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}
