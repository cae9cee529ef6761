//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, thresholds, concurrency)
//! - Check that the gate has everything it needs when enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::uri::Authority;
use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} port must be non-zero")]
    ZeroPort(&'static str),

    #[error("url_base_path must start with '/', got {0:?}")]
    BasePath(String),

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("gate is enabled but no workspace_url is configured")]
    MissingWorkspaceUrl,

    #[error("workspace_url {0:?} is not a valid URL")]
    WorkspaceUrl(String),

    #[error("gate login_path must start with '/', got {0:?}")]
    LoginPath(String),

    #[error("identity_header {0:?} is not a valid header name")]
    IdentityHeader(String),

    #[error("upstream address {0:?} is not a valid host:port")]
    UpstreamAddress(String),

    #[error("host_header {0:?} is not a valid header value")]
    HostHeader(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::ZeroPort("listener"));
    }
    if config.upstream.port == 0 {
        errors.push(ValidationError::ZeroPort("upstream"));
    }
    if !config.mount.url_base_path.starts_with('/') {
        errors.push(ValidationError::BasePath(config.mount.url_base_path.clone()));
    }

    let relay = &config.relay;
    if relay.incoming_streaming_threshold == 0 {
        errors.push(ValidationError::NotPositive("incoming_streaming_threshold"));
    }
    if relay.outgoing_streaming_threshold == 0 {
        errors.push(ValidationError::NotPositive("outgoing_streaming_threshold"));
    }
    if relay.max_concurrent_body_reads == 0 {
        errors.push(ValidationError::NotPositive("max_concurrent_body_reads"));
    }

    let gate = &config.gate;
    if gate.enabled {
        match gate.workspace_url.as_deref() {
            None | Some("") => errors.push(ValidationError::MissingWorkspaceUrl),
            Some(url) if Url::parse(url).is_err() => {
                errors.push(ValidationError::WorkspaceUrl(url.to_string()))
            }
            Some(_) => {}
        }
        if gate.credential_ttl_secs == 0 {
            errors.push(ValidationError::NotPositive("credential_ttl_secs"));
        }
    }
    if !gate.login_path.starts_with('/') {
        errors.push(ValidationError::LoginPath(gate.login_path.clone()));
    }
    if HeaderName::from_bytes(gate.identity_header.as_bytes()).is_err() {
        errors.push(ValidationError::IdentityHeader(gate.identity_header.clone()));
    }

    let upstream = format!("{}:{}", config.upstream.host, config.upstream.port);
    if upstream.parse::<Authority>().is_err() {
        errors.push(ValidationError::UpstreamAddress(upstream));
    }
    if let Some(host) = config.upstream.host_header.as_deref() {
        if HeaderValue::from_str(host).is_err() {
            errors.push(ValidationError::HostHeader(host.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
