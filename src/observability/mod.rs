//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, per-connection spans)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Connection ID flows through every log line of a handler
//! - Metrics are recorded through the `metrics` facade; without an
//!   installed exporter they are no-ops

pub mod logging;
pub mod metrics;
