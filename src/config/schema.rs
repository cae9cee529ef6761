//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::proxy::FrameworkKind;

/// Root configuration for the tunnel proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind host and port).
    pub listener: ListenerConfig,

    /// Where the mounted application listens.
    pub upstream: UpstreamConfig,

    /// External base path and framework kind.
    pub mount: MountConfig,

    /// Detection of traffic arriving through the front door.
    pub front_door: FrontDoorConfig,

    /// HTTP relay thresholds and retry policy.
    pub relay: RelayConfig,

    /// Optional login gate.
    pub gate: GateConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind host (e.g., "0.0.0.0").
    pub host: String,

    /// Port the proxy listens on.
    pub port: u16,
}

impl ListenerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Upstream application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Host the application listens on.
    pub host: String,

    /// Port the application listens on.
    pub port: u16,

    /// Host header presented upstream.
    ///
    /// `None` means `<host>:<port>`; an empty string forwards the caller's Host.
    pub host_header: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9989,
            host_header: None,
        }
    }
}

/// Mounted application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MountConfig {
    /// Path prefix assigned by the front door (e.g. "/driver-proxy/o/1/abc/8080/").
    pub url_base_path: String,

    /// Which rewrite rules and WebSocket header policy apply.
    pub framework: FrameworkKind,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            url_base_path: "/".to_string(),
            framework: FrameworkKind::Generic,
        }
    }
}

/// Front door detection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FrontDoorConfig {
    /// Host suffixes owned by the front door.
    pub domain_suffixes: Vec<String>,

    /// Hosts treated as the front door for local testing.
    pub loopback_hosts: Vec<String>,
}

impl Default for FrontDoorConfig {
    fn default() -> Self {
        Self {
            domain_suffixes: vec![
                ".azuredatabricks.net".to_string(),
                ".databricks.com".to_string(),
            ],
            loopback_hosts: vec![
                "0.0.0.0".to_string(),
                "127.0.0.1".to_string(),
                "localhost".to_string(),
            ],
        }
    }
}

/// HTTP relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Request bodies declared at or above this size are streamed upstream.
    pub incoming_streaming_threshold: u64,

    /// Successful responses declared above this size are streamed to the client.
    pub outgoing_streaming_threshold: u64,

    /// Maximum in-flight inbound body reads.
    pub max_concurrent_body_reads: usize,

    /// Delay before the single connect retry, in milliseconds.
    pub connect_retry_backoff_ms: u64,

    /// Upstream connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            incoming_streaming_threshold: 512 * 1024,
            outgoing_streaming_threshold: 5 * 1024 * 1024,
            max_concurrent_body_reads: 20,
            connect_retry_backoff_ms: 1000,
            connect_timeout_secs: 10,
        }
    }
}

/// Login gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Enable the login gate.
    pub enabled: bool,

    /// Identity provider base URL (the workspace URL).
    pub workspace_url: Option<String>,

    /// Trusted header carrying the caller identity.
    pub identity_header: String,

    /// How long a validated credential stays cached.
    pub credential_ttl_secs: u64,

    /// Upper bound on cached credentials.
    pub max_entries: usize,

    /// Path the login form posts to.
    pub login_path: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            workspace_url: None,
            identity_header: "x-databricks-user-name".to_string(),
            credential_ttl_secs: 360,
            max_entries: 250_000,
            login_path: "/dbtunnel/login".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.relay.incoming_streaming_threshold, 524_288);
        assert_eq!(config.relay.outgoing_streaming_threshold, 5_242_880);
        assert_eq!(config.mount.framework, FrameworkKind::Generic);
        assert!(!config.gate.enabled);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [mount]
            url_base_path = "/driver-proxy/o/1/abc/8501/"
            framework = "streamlit"

            [relay]
            connect_retry_backoff_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.mount.framework, FrameworkKind::Streamlit);
        assert_eq!(config.relay.connect_retry_backoff_ms, 250);
        assert_eq!(config.relay.max_concurrent_body_reads, 20);
        assert_eq!(config.upstream.port, 9989);
    }
}
