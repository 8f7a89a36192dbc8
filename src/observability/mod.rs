//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router, pool and health checker produce:
//!     → logging.rs (structured `tracing` events: backend, event, attempts, retries)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
