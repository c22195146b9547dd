//! System handlers: about, health, metrics, config, alerts.

use crate::admin_api::types::*;
use crate::metrics::collect_metrics;
use crate::response::{error_response, json_response, no_content, MockResponse, ResponseBuilder};
use bytes::Bytes;
use hyper::StatusCode;
use serde_json::Value;
use tracing::info;

/// GET / - Links to every resource
pub fn handle_root(base_url: &str) -> MockResponse {
    let body = RootResponse {
        links: make_root_links(base_url),
    };
    json_response(StatusCode::OK, &body)
}

/// GET /about
pub fn handle_about() -> MockResponse {
    let body = AboutResponse {
        versions: Versions {
            core: env!("CARGO_PKG_VERSION"),
            admin_api: env!("CARGO_PKG_VERSION"),
        },
    };
    json_response(StatusCode::OK, &body)
}

/// GET /health - Health check
pub fn handle_health(state: &AdminState) -> MockResponse {
    let body = HealthResponse {
        status: "ok",
        uptime: state.started_at.elapsed().as_secs(),
    };
    json_response(StatusCode::OK, &body)
}

/// GET /metrics - Prometheus metrics
pub fn handle_metrics() -> MockResponse {
    ResponseBuilder::new(StatusCode::OK)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(collect_metrics())
        .build()
}

/// GET /config - Current option values
pub fn handle_get_config(state: &AdminState) -> MockResponse {
    json_response(StatusCode::OK, &state.options.to_config())
}

/// PATCH /config - Change some options. Nothing changes if any is invalid.
pub fn handle_patch_config(state: &AdminState, body: &Bytes) -> MockResponse {
    let patch: Value = match serde_json::from_slice(body) {
        Ok(patch) => patch,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid JSON: {e}"));
        }
    };
    match state.options.apply_patch(&patch) {
        Ok(()) => {
            info!("Config updated through the admin API");
            no_content()
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

/// GET /alerts
pub fn handle_alerts(state: &AdminState) -> MockResponse {
    json_response(StatusCode::OK, &state.alerts.flat())
}

/// GET /alerts/:id
pub fn handle_alert(state: &AdminState, id: &str) -> MockResponse {
    match state.alerts.find(id) {
        Some(alert) => json_response(StatusCode::OK, &alert),
        None => error_response(
            StatusCode::NOT_FOUND,
            &format!("Alert with id \"{id}\" was not found"),
        ),
    }
}
