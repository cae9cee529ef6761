//! Response handling and transformation.
//!
//! # Responsibilities
//! - Responses the proxy fabricates itself
//! - Header bookkeeping after a body rewrite
//!
//! # Design Decisions
//! - Only an unreachable upstream gets a guidance body; other failures are
//!   terse

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

pub const UPSTREAM_UNAVAILABLE_MESSAGE: &str =
    "Unable to connect to app waiting for app server to respond. Refresh a few times otherwise restart.";

/// 502 returned once the connect retry has also failed.
pub fn upstream_unavailable() -> Response {
    (StatusCode::BAD_GATEWAY, UPSTREAM_UNAVAILABLE_MESSAGE).into_response()
}

pub fn upstream_failed() -> Response {
    (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
}

pub fn bad_request(message: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, message).into_response()
}

pub fn service_unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "Proxy is shutting down").into_response()
}

pub fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(location) => Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, location)
            .body(Body::empty())
            .unwrap_or_else(|_| StatusCode::FOUND.into_response()),
        Err(_) => bad_request("Invalid redirect target"),
    }
}

/// Content-Length follows the rewritten body; framing is left to the server.
pub fn set_rewritten_length(headers: &mut HeaderMap, len: usize) {
    headers.remove(header::TRANSFER_ENCODING);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
}
