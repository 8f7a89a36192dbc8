//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (buffered)
//!     → router.rs (attempt ceiling check)
//!     → load_balancer::pool (next alive peer)
//!     → backend forwarder
//!     → on failure: retry same peer, or mark dead and re-select
//!     → response, or 503 Service Unavailable
//! ```
//!
//! # Design Decisions
//! - Per-request counters are a local value, never ambient context
//! - Pool exhaustion and attempt ceiling look identical to clients
//! - Upstream responses are relayed whatever their status

pub mod router;

pub use router::{RequestRouter, RouteError};
