//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Forward attempt fails:
//!     → retries.rs (retry same backend after a fixed backoff)
//!     → retry ceiling hit: backend marked dead, attempt counter bumped
//!     → attempt ceiling hit: request ends with 503
//! ```
//!
//! Every forward attempt is also bounded by the forwarder's own deadline
//! (see `http::forward`); a timeout is handled like any other failure.

pub mod retries;

pub use retries::{AttemptState, RetryPolicy};
