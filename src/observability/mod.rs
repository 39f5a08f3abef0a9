//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline stages and handlers produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and latency histograms)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line via the trace span
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
