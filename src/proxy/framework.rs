//! Mounted framework kinds.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The kind of application mounted behind the proxy.
///
/// Resolved once at startup; selects the rewrite rule set and whether the
/// WebSocket relay adapts handshake headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkKind {
    /// Any HTTP/1.1 + WebSocket server; no rewrites.
    #[default]
    Generic,
    Streamlit,
    Gradio,
    Chainlit,
    #[value(name = "arize_phoenix", alias = "arize-phoenix")]
    ArizePhoenix,
}

impl FrameworkKind {
    /// Whether the upstream validates `Origin` and rejects forwarded
    /// informational headers on WebSocket upgrades.
    pub fn adapts_websocket_headers(self) -> bool {
        matches!(self, FrameworkKind::Streamlit)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FrameworkKind::Generic => "generic",
            FrameworkKind::Streamlit => "streamlit",
            FrameworkKind::Gradio => "gradio",
            FrameworkKind::Chainlit => "chainlit",
            FrameworkKind::ArizePhoenix => "arize_phoenix",
        }
    }
}

impl fmt::Display for FrameworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
