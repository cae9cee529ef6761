//! Compiled, read-only proxy configuration.
//!
//! `ProxyConfig` is what the operator writes; `ProxyConfiguration` is what
//! the relays read. It is built once at startup and shared through an `Arc`.

use std::time::Duration;

use axum::http::uri::Authority;
use axum::http::{HeaderName, HeaderValue};
use url::Url;

use crate::config::validation::{validate_config, ValidationError};
use crate::config::{ConfigError, ProxyConfig, RelayConfig};
use crate::proxy::rewrite::RuleSet;
use crate::proxy::{BasePath, FrameworkKind, FrontDoor};

/// HTTP relay limits.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub incoming_streaming_threshold: u64,
    pub outgoing_streaming_threshold: u64,
    pub max_concurrent_body_reads: usize,
    pub connect_retry_backoff: Duration,
    pub connect_timeout: Duration,
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            incoming_streaming_threshold: config.incoming_streaming_threshold,
            outgoing_streaming_threshold: config.outgoing_streaming_threshold,
            max_concurrent_body_reads: config.max_concurrent_body_reads,
            connect_retry_backoff: Duration::from_millis(config.connect_retry_backoff_ms),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }
}

/// Login gate settings; present only when the gate is enabled.
#[derive(Debug, Clone)]
pub struct GateSettings {
    pub workspace_url: Url,
    pub identity_header: HeaderName,
    pub credential_ttl: Duration,
    pub max_entries: usize,
    pub login_path: String,
}

#[derive(Debug)]
pub struct ProxyConfiguration {
    upstream: Authority,
    host_header: Option<HeaderValue>,
    framework: FrameworkKind,
    base_path: BasePath,
    rules: RuleSet,
    front_door: FrontDoor,
    relay: RelaySettings,
    gate: Option<GateSettings>,
}

impl ProxyConfiguration {
    /// Configuration for an upstream on `host:port` mounted under `base_path`,
    /// with every other setting at its default.
    pub fn for_framework(
        host: &str,
        port: u16,
        framework: FrameworkKind,
        base_path: &str,
    ) -> Result<Self, ConfigError> {
        let mut config = ProxyConfig::default();
        config.upstream.host = host.to_string();
        config.upstream.port = port;
        config.mount.framework = framework;
        config.mount.url_base_path = base_path.to_string();
        Self::from_config(&config)
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;
        let invalid = |error: ValidationError| ConfigError::Validation(vec![error]);

        let address = format!("{}:{}", config.upstream.host, config.upstream.port);
        let upstream: Authority = address
            .parse()
            .map_err(|_| invalid(ValidationError::UpstreamAddress(address.clone())))?;

        let host_header = match config.upstream.host_header.as_deref() {
            None => Some(address.as_str()),
            Some("") => None,
            Some(host) => Some(host),
        }
        .map(|host| {
            HeaderValue::from_str(host).map_err(|_| invalid(ValidationError::HostHeader(host.to_string())))
        })
        .transpose()?;

        let base_path = BasePath::new(&config.mount.url_base_path);
        let rules = RuleSet::for_framework(config.mount.framework, &base_path)?;

        let gate = if config.gate.enabled {
            let raw = config.gate.workspace_url.clone().unwrap_or_default();
            let workspace_url = workspace_base(&raw)
                .ok_or_else(|| invalid(ValidationError::WorkspaceUrl(raw.clone())))?;
            let identity_header = HeaderName::from_bytes(config.gate.identity_header.as_bytes())
                .map_err(|_| {
                    invalid(ValidationError::IdentityHeader(config.gate.identity_header.clone()))
                })?;
            Some(GateSettings {
                workspace_url,
                identity_header,
                credential_ttl: Duration::from_secs(config.gate.credential_ttl_secs),
                max_entries: config.gate.max_entries,
                login_path: config.gate.login_path.clone(),
            })
        } else {
            None
        };

        Ok(Self {
            upstream,
            host_header,
            framework: config.mount.framework,
            base_path,
            rules,
            front_door: FrontDoor::new(&config.front_door),
            relay: RelaySettings::from(&config.relay),
            gate,
        })
    }

    /// `host:port` of the mounted application.
    pub fn upstream(&self) -> &Authority {
        &self.upstream
    }

    /// Host header presented upstream; `None` forwards the caller's.
    pub fn host_header(&self) -> Option<&HeaderValue> {
        self.host_header.as_ref()
    }

    pub fn framework(&self) -> FrameworkKind {
        self.framework
    }

    pub fn base_path(&self) -> &BasePath {
        &self.base_path
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn front_door(&self) -> &FrontDoor {
        &self.front_door
    }

    pub fn relay(&self) -> &RelaySettings {
        &self.relay
    }

    pub fn gate(&self) -> Option<&GateSettings> {
        self.gate.as_ref()
    }
}

/// Parse the workspace URL so relative joins land under it.
fn workspace_base(raw: &str) -> Option<Url> {
    let mut url = Url::parse(raw).ok()?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_header_defaults_to_upstream_address() {
        let config =
            ProxyConfiguration::for_framework("127.0.0.1", 8501, FrameworkKind::Streamlit, "/p/8501/")
                .unwrap();
        assert_eq!(config.upstream().as_str(), "127.0.0.1:8501");
        assert_eq!(config.host_header().unwrap(), "127.0.0.1:8501");
        assert_eq!(config.base_path().as_str(), "/p/8501");
        assert!(config.gate().is_none());
    }

    #[test]
    fn empty_host_header_disables_override() {
        let mut config = ProxyConfig::default();
        config.upstream.host_header = Some(String::new());
        let compiled = ProxyConfiguration::from_config(&config).unwrap();
        assert!(compiled.host_header().is_none());
    }

    #[test]
    fn framework_selects_rule_set() {
        let config =
            ProxyConfiguration::for_framework("127.0.0.1", 8000, FrameworkKind::Chainlit, "/p/8000/")
                .unwrap();
        assert_eq!(config.rules().len(), 5);
    }

    #[test]
    fn gate_settings_are_compiled_when_enabled() {
        let mut config = ProxyConfig::default();
        config.gate.enabled = true;
        config.gate.workspace_url = Some("https://dbc-1.cloud.databricks.com".to_string());
        let compiled = ProxyConfiguration::from_config(&config).unwrap();
        let gate = compiled.gate().unwrap();
        assert_eq!(gate.workspace_url.as_str(), "https://dbc-1.cloud.databricks.com/");
        assert_eq!(gate.identity_header.as_str(), "x-databricks-user-name");
        assert_eq!(gate.credential_ttl, Duration::from_secs(360));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = ProxyConfig::default();
        config.mount.url_base_path = "nope".to_string();
        assert!(matches!(
            ProxyConfiguration::from_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }
}
