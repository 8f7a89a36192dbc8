//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, access span, body buffering)
//!     → routing::RequestRouter (peer selection, retry/failover)
//!     → forward.rs (URI rewrite, header cleanup, upstream call)
//!     → response relayed to client
//! ```

pub mod forward;
pub mod server;

pub use forward::{HttpForwarder, UpstreamRequest};
pub use server::HttpServer;
