//! Proxy configuration and content rewriting.
//!
//! # Data Flow
//! ```text
//! ProxyConfig (validated)
//!     → FrameworkKind resolved once
//!     → rewrite::RuleSet built for that kind under the BasePath
//!     → ProxyConfiguration (immutable, Arc-shared by relays and gate)
//! ```

pub mod base_path;
pub mod configuration;
pub mod framework;
pub mod front_door;
pub mod rewrite;

pub use base_path::BasePath;
pub use configuration::{GateSettings, ProxyConfiguration, RelaySettings};
pub use framework::FrameworkKind;
pub use front_door::FrontDoor;
