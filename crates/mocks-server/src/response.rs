//! Response building shared by the mock server, variant handlers and the
//! admin API.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::http::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Response, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Response type produced by every handler
pub type MockResponse = Response<Full<Bytes>>;

pub struct ResponseBuilder {
    status: StatusCode,
    body: Bytes,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        ResponseBuilder {
            status,
            body: Bytes::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Builder for a numeric status; invalid codes become 500.
    pub fn with_status_code(status: u16) -> Self {
        Self::new(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the body and set a JSON content type unless one
    /// was already given.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.body = serde_json::to_vec(value)
            .map(Bytes::from)
            .unwrap_or_else(|_| Bytes::from_static(b"null"));
        self.default_content_type("application/json; charset=utf-8")
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = Bytes::from(text.into());
        self.default_content_type("text/plain; charset=utf-8")
    }

    pub fn default_content_type(mut self, content_type: &'static str) -> Self {
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        self
    }

    /// Invalid header names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        for (name, value) in headers {
            self = self.header(name, value);
        }
        self
    }

    pub fn build(self) -> MockResponse {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorDetail>,
}

/// Individual error detail
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Create a JSON response
pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> MockResponse {
    ResponseBuilder::new(status).json(body).build()
}

/// Create an error response
pub fn error_response(status: StatusCode, message: &str) -> MockResponse {
    let error = ErrorResponse {
        errors: vec![ErrorDetail {
            code: status.as_str().to_string(),
            message: message.to_string(),
        }],
    };
    json_response(status, &error)
}

/// Create a not found response
pub fn not_found() -> MockResponse {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

/// Create an empty 204 response
pub fn no_content() -> MockResponse {
    ResponseBuilder::new(StatusCode::NO_CONTENT).build()
}
