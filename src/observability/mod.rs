//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every subsystem emits:
//!     → logging.rs (tracing events, filtered by EnvFilter)
//!     → metrics.rs (per-API counters and latency histograms)
//!
//! Consumers:
//!     → stdout log stream
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID from tower-http flows into every request log line
//! - Metric updates are cheap no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
