//! Request handling of the mock server.

use crate::metrics;
use crate::mock::Mock;
use crate::response::{error_response, not_found, MockResponse, ResponseBuilder};
use crate::variant_handlers::MockRequest;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD,
};
use hyper::{Method, Request, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const CORS_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

/// CORS preflight request
fn is_preflight<B>(req: &Request<B>) -> bool {
    req.method() == Method::OPTIONS && req.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
}

fn preflight_response<B>(req: &Request<B>) -> MockResponse {
    let mut builder =
        ResponseBuilder::new(StatusCode::NO_CONTENT).header(ACCESS_CONTROL_ALLOW_METHODS.as_str(), CORS_METHODS);
    if let Some(headers) = req
        .headers()
        .get(ACCESS_CONTROL_REQUEST_HEADERS)
        .and_then(|value| value.to_str().ok())
    {
        builder = builder.header(ACCESS_CONTROL_ALLOW_HEADERS.as_str(), headers);
    }
    builder.build()
}

fn with_cors(mut response: MockResponse, cors: bool) -> MockResponse {
    if cors {
        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    }
    response
}

/// Answer one request with the variant currently mounted for it
pub async fn handle_request(
    req: Request<Incoming>,
    peer: SocketAddr,
    mock: Arc<Mock>,
    cors: bool,
) -> MockResponse {
    if cors && is_preflight(&req) {
        return with_cors(preflight_response(&req), cors);
    }

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(%peer, "Failed to read request body: {}", e);
            return with_cors(
                error_response(StatusCode::BAD_REQUEST, "Invalid request body"),
                cors,
            );
        }
    };

    let response = dispatch(
        &mock,
        MockRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            params: Default::default(),
            body,
        },
    )
    .await;
    with_cors(response, cors)
}

/// Route `request` through the mounted table of `mock`
pub async fn dispatch(mock: &Mock, mut request: MockRequest) -> MockResponse {
    let mounted = mock.mounted();
    let Some(found) = mounted.find(&request.method, request.uri.path()) else {
        debug!(method = %request.method, path = request.uri.path(), "No route matched");
        metrics::record_unmatched(request.method.as_str());
        return not_found();
    };
    let route = &found.mounted.route;
    let variant = &found.mounted.variant;

    let delay = found.mounted.delay(mock.global_delay());
    if delay > 0 {
        metrics::record_delay(&route.id, delay);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    request.params = found.params;
    let response = found.mounted.responder().respond(&request).await;

    debug!(
        method = %request.method,
        path = request.uri.path(),
        route = %route.id,
        variant = %variant.id,
        status = response.status().as_u16(),
        delay,
        "Request served"
    );
    metrics::record_request(&route.id, &variant.id, response.status().as_u16());
    response
}
