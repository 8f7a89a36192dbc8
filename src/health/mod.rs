//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Fixed interval timer
//!     → Probe each backend (TCP connect, or HTTP GET when a path is set)
//!     → Backend::set_alive(result)
//!
//! Passive detection lives in the router: a backend that keeps failing
//! forwards is marked dead there, and the next sweep may revive it.
//! ```
//!
//! # Design Decisions
//! - Probe result overwrites liveness every cycle; no thresholds
//! - Probe errors are logged and become `false`, never fatal
//! - One sweep at a time; ticks missed during a slow sweep are delayed

pub mod active;

pub use active::{HealthChecker, HttpProbe, Probe, TcpProbe};
