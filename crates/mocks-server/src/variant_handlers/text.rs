use super::{
    header_map, parse_options, status_code, MockRequest, VariantHandler, VariantResponder,
};
use crate::response::{MockResponse, ResponseBuilder};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TextOptions {
    #[serde(deserialize_with = "status_code")]
    status: u16,
    #[serde(default, deserialize_with = "header_map")]
    headers: BTreeMap<String, String>,
    body: String,
}

/// `type: text`
pub struct TextHandler;

impl VariantHandler for TextHandler {
    fn id(&self) -> &str {
        "text"
    }

    fn build(&self, options: &Value) -> Result<Arc<dyn VariantResponder>, String> {
        let options: TextOptions = parse_options(options)?;
        Ok(Arc::new(TextResponder { options }))
    }

    fn preview(&self, options: &Value) -> Option<Value> {
        let options: TextOptions = parse_options(options).ok()?;
        Some(json!({"status": options.status, "body": options.body}))
    }
}

struct TextResponder {
    options: TextOptions,
}

#[async_trait]
impl VariantResponder for TextResponder {
    async fn respond(&self, _request: &MockRequest) -> MockResponse {
        ResponseBuilder::with_status_code(self.options.status)
            .headers(&self.options.headers)
            .text(self.options.body.clone())
            .build()
    }
}
