//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request router asks for a peer
//!     → pool.rs (advance cursor, scan for an alive backend)
//!     → backend.rs (liveness read under the backend's own lock)
//!     → Return backend, or None when the pool is exhausted
//! ```
//!
//! # Design Decisions
//! - Round-robin only; the cursor is a single atomic shared by all requests
//! - Dead backends are skipped and the cursor fast-forwards past them
//! - Liveness locking is per backend, never pool-wide
//! - Backend list is fixed after startup, so iteration needs no lock

pub mod backend;
pub mod pool;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Backend, Forward, ForwardError};
pub use pool::ServerPool;
