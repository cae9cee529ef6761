//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Relay → hyper client → retries.rs (connect; on refusal wait, connect once more)
//!                      → connect error surfaces to the relay as a 502
//! ```

pub mod retries;

pub use retries::RetryOnceConnector;
