//! Shared state and request/response types for the Admin API.

use crate::alerts::Alerts;
use crate::config::Options;
use crate::mock::Mock;
use bytes::Bytes;
use hyper::body::Incoming;
use hyper::Request;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Everything the admin handlers read or change
pub struct AdminState {
    pub mock: Arc<Mock>,
    pub options: Arc<Options>,
    /// Root alerts of the server
    pub alerts: Alerts,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(mock: Arc<Mock>, options: Arc<Options>, alerts: Alerts) -> Self {
        Self {
            mock,
            options,
            alerts,
            started_at: Instant::now(),
        }
    }
}

/// HATEOAS link structure
#[derive(Debug, Serialize, Clone)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Serialize)]
pub struct RootLinks {
    pub about: Link,
    pub config: Link,
    pub alerts: Link,
    pub routes: Link,
    pub variants: Link,
    pub collections: Link,
    #[serde(rename = "customRouteVariants")]
    pub custom_route_variants: Link,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    #[serde(rename = "_links")]
    pub links: RootLinks,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Versions {
    pub core: &'static str,
    pub admin_api: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AboutResponse {
    pub versions: Versions,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Seconds since the admin API was created
    pub uptime: u64,
}

/// Body of `POST /mock/custom-route-variants`
#[derive(Debug, Deserialize)]
pub struct CustomRouteVariantRequest {
    pub id: String,
}

/// Extract base URL from request headers for HATEOAS links
pub fn get_base_url<B>(req: &Request<B>) -> String {
    if let Some(host) = req.headers().get("host") {
        if let Ok(host_str) = host.to_str() {
            return format!("http://{}", host_str);
        }
    }
    "http://localhost:3110".to_string()
}

pub fn make_root_links(base_url: &str) -> RootLinks {
    let link = |path: &str| Link {
        href: format!("{}{}", base_url, path),
    };
    RootLinks {
        about: link("/about"),
        config: link("/config"),
        alerts: link("/alerts"),
        routes: link("/mock/routes"),
        variants: link("/mock/variants"),
        collections: link("/mock/collections"),
        custom_route_variants: link("/mock/custom-route-variants"),
    }
}

/// Collect request body into bytes
pub async fn collect_body(req: Request<Incoming>) -> Result<Bytes, String> {
    use http_body_util::BodyExt;
    req.collect()
        .await
        .map(|c| c.to_bytes())
        .map_err(|e| format!("Failed to read request body: {e}"))
}
