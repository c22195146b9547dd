//! Mock handlers: routes, variants, collections and custom route variants.

use crate::admin_api::types::{AdminState, CustomRouteVariantRequest};
use crate::response::{error_response, json_response, no_content, MockResponse};
use bytes::Bytes;
use hyper::StatusCode;
use tracing::info;

fn not_found(kind: &str, id: &str) -> MockResponse {
    error_response(
        StatusCode::NOT_FOUND,
        &format!("{kind} with id \"{id}\" was not found"),
    )
}

/// GET /mock/routes
pub fn handle_routes(state: &AdminState) -> MockResponse {
    json_response(StatusCode::OK, &state.mock.plain_routes())
}

/// GET /mock/routes/:id
pub fn handle_route(state: &AdminState, id: &str) -> MockResponse {
    match state.mock.route(id) {
        Some(route) => json_response(StatusCode::OK, &route.to_plain()),
        None => not_found("Route", id),
    }
}

/// GET /mock/variants
pub fn handle_variants(state: &AdminState) -> MockResponse {
    json_response(StatusCode::OK, &state.mock.plain_variants())
}

/// GET /mock/variants/:id
pub fn handle_variant(state: &AdminState, id: &str) -> MockResponse {
    match state.mock.variant(id) {
        Some(variant) => json_response(StatusCode::OK, &variant.to_plain()),
        None => not_found("Route variant", id),
    }
}

/// GET /mock/collections
pub fn handle_collections(state: &AdminState) -> MockResponse {
    json_response(StatusCode::OK, &state.mock.plain_collections())
}

/// GET /mock/collections/:id
pub fn handle_collection(state: &AdminState, id: &str) -> MockResponse {
    match state.mock.collection(id) {
        Some(collection) => json_response(StatusCode::OK, collection.as_ref()),
        None => not_found("Collection", id),
    }
}

/// GET /mock/custom-route-variants
pub fn handle_custom_route_variants(state: &AdminState) -> MockResponse {
    json_response(StatusCode::OK, &state.mock.custom_route_variants())
}

/// POST /mock/custom-route-variants - Use a route variant over the collection
pub fn handle_add_custom_route_variant(state: &AdminState, body: &Bytes) -> MockResponse {
    let request: CustomRouteVariantRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid request: {e}"));
        }
    };
    match state.mock.use_route_variant(&request.id) {
        Ok(()) => {
            info!(variant = %request.id, "Custom route variant set through the admin API");
            no_content()
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

/// DELETE /mock/custom-route-variants - Back to the collection's variants
pub fn handle_restore_route_variants(state: &AdminState) -> MockResponse {
    state.mock.restore_route_variants();
    no_content()
}
