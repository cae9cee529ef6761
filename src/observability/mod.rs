//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Relays, gate and retry connector produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr (fmt subscriber, filtered by EnvFilter)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request
//! - Metrics are cheap; with no recorder installed they are no-ops

pub mod logging;
pub mod metrics;
