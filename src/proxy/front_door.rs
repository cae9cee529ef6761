//! Recognizing traffic that arrives through the front door.
//!
//! This is a host-name match, not a trust boundary.

use axum::http::{header, HeaderMap};

use crate::config::FrontDoorConfig;

#[derive(Debug, Clone)]
pub struct FrontDoor {
    domain_suffixes: Vec<String>,
    loopback_hosts: Vec<String>,
}

impl FrontDoor {
    pub fn new(config: &FrontDoorConfig) -> Self {
        Self {
            domain_suffixes: config
                .domain_suffixes
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
            loopback_hosts: config
                .loopback_hosts
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether `Host` or `X-Forwarded-Host` names a front door host.
    pub fn recognizes(&self, headers: &HeaderMap) -> bool {
        [header::HOST.as_str(), "x-forwarded-host"]
            .into_iter()
            .filter_map(|name| headers.get(name).and_then(|v| v.to_str().ok()))
            .map(first_header_value)
            .any(|host| self.is_known_host(host))
    }

    pub fn is_known_host(&self, host: &str) -> bool {
        let host = host_without_port(host).to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }
        self.domain_suffixes.iter().any(|suffix| host.ends_with(suffix.as_str()))
            || self.loopback_hosts.iter().any(|loopback| host == *loopback)
    }
}

fn first_header_value(value: &str) -> &str {
    value.split(',').next().unwrap_or(value).trim()
}

fn host_without_port(host: &str) -> &str {
    if host.starts_with('[') {
        if let Some(end) = host.find(']') {
            return &host[..=end];
        }
    }
    match host.rsplit_once(':') {
        Some((name, _port)) => name,
        None => host,
    }
}
