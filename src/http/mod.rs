//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → dispatcher builds context.rs::RequestContext
//!     → WebSocket upgrade? → websocket.rs (frame relay)
//!     → otherwise          → gate (optional) → relay.rs (HTTP relay)
//!     → response.rs (fabricated responses, rewrite bookkeeping)
//!     → Send to client
//! ```

pub mod context;
pub mod relay;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use context::RequestContext;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
pub use websocket::WebSocketRelayError;
