//! Per-request metadata.
//!
//! Built once at the top of the dispatcher and passed explicitly through the
//! gate and the relays.

use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};

use crate::http::request::X_REQUEST_ID;
use crate::proxy::ProxyConfiguration;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    /// Path as received, prefix included.
    pub path: String,
    pub query: Option<String>,
    /// Path relative to the upstream; the base path is removed only for
    /// front door traffic.
    pub upstream_path: String,
    /// Headers to forward upstream; the gate may add credentials.
    pub headers: HeaderMap,
    pub via_front_door: bool,
    /// Port this proxy listens on.
    pub self_port: u16,
}

impl RequestContext {
    pub fn new(parts: &Parts, config: &ProxyConfiguration, self_port: u16) -> Self {
        let path = parts.uri.path().to_string();
        let via_front_door = config.front_door().recognizes(&parts.headers);
        let upstream_path = if via_front_door {
            config
                .base_path()
                .strip(&path)
                .unwrap_or(path.as_str())
                .to_string()
        } else {
            path.clone()
        };
        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Self {
            request_id,
            method: parts.method.clone(),
            path,
            query: parts.uri.query().map(str::to_string),
            upstream_path,
            headers: parts.headers.clone(),
            via_front_door,
            self_port,
        }
    }

    /// Upstream path with the original query string re-attached.
    pub fn upstream_path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.upstream_path, query),
            None => self.upstream_path.clone(),
        }
    }

    /// Application root as the caller addresses it.
    pub fn external_root(&self, config: &ProxyConfiguration) -> String {
        if self.via_front_door {
            config.base_path().root()
        } else {
            "/".to_string()
        }
    }

    /// `path` (upstream-relative) as the caller addresses it.
    pub fn external_path(&self, config: &ProxyConfiguration, path: &str) -> String {
        if self.via_front_door {
            config.base_path().join(path)
        } else {
            path.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::FrameworkKind;
    use axum::http::Request;

    fn config() -> ProxyConfiguration {
        ProxyConfiguration::for_framework(
            "127.0.0.1",
            7860,
            FrameworkKind::Gradio,
            "/driver-proxy/o/1/abc/7860/",
        )
        .unwrap()
    }

    fn parts(host: &str, uri: &str) -> Parts {
        let (parts, ()) = Request::builder()
            .uri(uri)
            .header("host", host)
            .header(X_REQUEST_ID, "req-1")
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn front_door_traffic_is_stripped() {
        let config = config();
        let ctx = RequestContext::new(
            &parts(
                "adb-1.2.azuredatabricks.net",
                "/driver-proxy/o/1/abc/7860/assets/index-1.js?v=2",
            ),
            &config,
            8080,
        );
        assert!(ctx.via_front_door);
        assert_eq!(ctx.upstream_path, "/assets/index-1.js");
        assert_eq!(ctx.upstream_path_and_query(), "/assets/index-1.js?v=2");
        assert_eq!(ctx.request_id, "req-1");
        assert_eq!(ctx.external_root(&config), "/driver-proxy/o/1/abc/7860/");
        assert_eq!(
            ctx.external_path(&config, "/dbtunnel/login"),
            "/driver-proxy/o/1/abc/7860/dbtunnel/login"
        );
    }

    #[test]
    fn other_hosts_keep_the_full_path() {
        let config = config();
        let ctx = RequestContext::new(
            &parts("relay.internal:9000", "/driver-proxy/o/1/abc/7860/info"),
            &config,
            8080,
        );
        assert!(!ctx.via_front_door);
        assert_eq!(ctx.upstream_path, "/driver-proxy/o/1/abc/7860/info");
        assert_eq!(ctx.external_root(&config), "/");
    }

    #[test]
    fn base_path_itself_maps_to_root() {
        let config = config();
        let ctx = RequestContext::new(
            &parts("localhost:8080", "/driver-proxy/o/1/abc/7860"),
            &config,
            8080,
        );
        assert_eq!(ctx.upstream_path, "/");
    }
}
