//! Request handling and transformation.
//!
//! # Responsibilities
//! - Name the request ID header shared by the layers and the relays
//! - Build the header set forwarded upstream
//!
//! # Design Decisions
//! - Request ID is assigned by `SetRequestIdLayer` before any handler runs
//! - Host is replaced, never appended; every other end-to-end header is
//!   forwarded with its casing and multiplicity intact

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Connection-scoped headers that must not cross the proxy.
const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::PROXY_AUTHORIZATION,
];

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

/// Headers for the upstream request: the caller's end-to-end headers with
/// Host overridden when configured.
pub fn upstream_headers(client: &HeaderMap, host: Option<&HeaderValue>) -> HeaderMap {
    let mut headers = client.clone();
    strip_hop_by_hop(&mut headers);
    if let Some(host) = host {
        headers.insert(header::HOST, host.clone());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_is_overridden_and_multi_values_survive() {
        let mut client = HeaderMap::new();
        client.insert(header::HOST, HeaderValue::from_static("adb-1.azuredatabricks.net"));
        client.append(header::COOKIE, HeaderValue::from_static("a=1"));
        client.append(header::COOKIE, HeaderValue::from_static("b=2"));
        client.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-private"));
        client.insert("x-private", HeaderValue::from_static("1"));

        let upstream = upstream_headers(&client, Some(&HeaderValue::from_static("127.0.0.1:8501")));
        assert_eq!(upstream[header::HOST], "127.0.0.1:8501");
        assert_eq!(upstream.get_all(header::COOKIE).iter().count(), 2);
        assert!(upstream.get(header::CONNECTION).is_none());
        assert!(upstream.get("x-private").is_none());
    }

    #[test]
    fn host_passes_through_without_override() {
        let mut client = HeaderMap::new();
        client.insert(header::HOST, HeaderValue::from_static("example.org"));
        let upstream = upstream_headers(&client, None);
        assert_eq!(upstream[header::HOST], "example.org");
    }
}
