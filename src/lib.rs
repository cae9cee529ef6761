//! Embedded reverse proxy for locally hosted web applications.
//!
//! Exposes an application listening on a local port to callers that reach
//! it through a front door under a dynamic path prefix. HTTP and WebSocket
//! traffic is relayed transparently; single-page-application bundles are
//! rewritten so their absolute URLs resolve under the prefix; an optional
//! login gate caches validated credentials.
//!
//! # Architecture Overview
//!
//! ```text
//! Client
//!   → dispatcher (RequestContext, front door detection, prefix strip)
//!       → WebSocket upgrade → WebSocket relay ⇄ upstream socket
//!       → otherwise → gate (optional) → HTTP relay → upstream
//!                                          → rule set rewrites bundles
//!
//! Cross-cutting: config · resilience · observability · lifecycle
//! ```

// Core subsystems
pub mod config;
pub mod gate;
pub mod http;
pub mod proxy;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::{FrameworkKind, ProxyConfiguration};
