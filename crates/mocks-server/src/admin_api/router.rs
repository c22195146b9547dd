//! Route dispatch logic for the Admin API.

use crate::admin_api::handlers::{mock, system};
use crate::admin_api::types::{collect_body, get_base_url, AdminState};
use crate::response::{error_response, not_found, MockResponse};
use bytes::Bytes;
use hyper::body::Incoming;
use hyper::{Method, Request, StatusCode};
use std::sync::Arc;
use tracing::debug;

/// Parsed route for endpoints under `/mock`
#[derive(Debug, PartialEq)]
enum MockRoute {
    /// GET /mock/routes
    Routes,
    /// GET /mock/routes/:id
    Route(String),
    /// GET /mock/variants
    Variants,
    /// GET /mock/variants/:id
    Variant(String),
    /// GET /mock/collections
    Collections,
    /// GET /mock/collections/:id
    Collection(String),
    /// GET/POST/DELETE /mock/custom-route-variants
    CustomRouteVariants,
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

impl MockRoute {
    /// Parse route from path segments after `/mock`
    fn parse(segments: &[&str]) -> Option<Self> {
        match segments {
            ["routes"] => Some(MockRoute::Routes),
            ["routes", id] => Some(MockRoute::Route(decode(id))),
            ["variants"] => Some(MockRoute::Variants),
            ["variants", id] => Some(MockRoute::Variant(decode(id))),
            ["collections"] => Some(MockRoute::Collections),
            ["collections", id] => Some(MockRoute::Collection(decode(id))),
            ["custom-route-variants"] => Some(MockRoute::CustomRouteVariants),
            _ => None,
        }
    }
}

/// Main request router
pub async fn route_request(req: Request<Incoming>, state: Arc<AdminState>) -> MockResponse {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let base_url = get_base_url(&req);

    debug!("Admin API: {} {}", method, path);

    let body = match collect_body(req).await {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    route_by_path(&state, &method, &path, &body, &base_url)
}

/// Route based on path
pub fn route_by_path(
    state: &AdminState,
    method: &Method,
    path: &str,
    body: &Bytes,
    base_url: &str,
) -> MockResponse {
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    match (method, path) {
        (&Method::GET, "/") => return system::handle_root(base_url),
        (&Method::GET, "/about") => return system::handle_about(),
        (&Method::GET, "/health") => return system::handle_health(state),
        (&Method::GET, "/metrics") => return system::handle_metrics(),
        (&Method::GET, "/config") => return system::handle_get_config(state),
        (&Method::PATCH, "/config") => return system::handle_patch_config(state, body),
        (&Method::GET, "/alerts") => return system::handle_alerts(state),
        _ => {}
    }

    // Alert ids may contain slashes (file paths)
    if let Some(id) = path.strip_prefix("/alerts/") {
        return match *method {
            Method::GET => system::handle_alert(state, &decode(id)),
            _ => not_found(),
        };
    }

    if let Some(rest) = path.strip_prefix("/mock/") {
        let segments: Vec<&str> = rest.split('/').collect();
        return match MockRoute::parse(&segments) {
            Some(route) => route_mock(state, method, route, body),
            None => not_found(),
        };
    }

    not_found()
}

fn route_mock(state: &AdminState, method: &Method, route: MockRoute, body: &Bytes) -> MockResponse {
    match (method, route) {
        (&Method::GET, MockRoute::Routes) => mock::handle_routes(state),
        (&Method::GET, MockRoute::Route(id)) => mock::handle_route(state, &id),
        (&Method::GET, MockRoute::Variants) => mock::handle_variants(state),
        (&Method::GET, MockRoute::Variant(id)) => mock::handle_variant(state, &id),
        (&Method::GET, MockRoute::Collections) => mock::handle_collections(state),
        (&Method::GET, MockRoute::Collection(id)) => mock::handle_collection(state, &id),

        // /mock/custom-route-variants
        (&Method::GET, MockRoute::CustomRouteVariants) => {
            mock::handle_custom_route_variants(state)
        }
        (&Method::POST, MockRoute::CustomRouteVariants) => {
            mock::handle_add_custom_route_variant(state, body)
        }
        (&Method::DELETE, MockRoute::CustomRouteVariants) => {
            mock::handle_restore_route_variants(state)
        }

        _ => not_found(),
    }
}
