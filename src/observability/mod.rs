//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request path produces:
//!     → logging.rs (structured tracing events, env-filtered)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout log stream
//!     → Prometheus scrape endpoint (when enabled)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every span
//! - Credential and organization values are never recorded
//! - Metric calls are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
