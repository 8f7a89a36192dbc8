//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Track liveness behind a lock owned by this backend alone
//! - Own the capability that relays requests to the upstream

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Response;
use parking_lot::RwLock;
use thiserror::Error;
use url::Url;

use crate::http::forward::UpstreamRequest;

/// A single relay attempt that did not produce an upstream response.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Connection refused/reset, protocol error, etc.
    #[error("upstream error: {0}")]
    Upstream(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// No response head within the forwarding deadline.
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    /// The outbound request could not be built.
    #[error("invalid outbound request: {0}")]
    InvalidRequest(String),
}

/// Relays a request to one upstream address.
#[async_trait]
pub trait Forward: Send + Sync + fmt::Debug {
    async fn forward(&self, request: &UpstreamRequest) -> Result<Response<Body>, ForwardError>;
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    url: Url,
    alive: RwLock<bool>,
    forwarder: Arc<dyn Forward>,
}

impl Backend {
    /// Create a new backend. Backends start optimistically alive.
    pub fn new(url: Url, forwarder: Arc<dyn Forward>) -> Self {
        Self {
            url,
            alive: RwLock::new(true),
            forwarder,
        }
    }

    /// The upstream URL this backend relays to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Overwrite the liveness flag, returning the previous value.
    pub fn set_alive(&self, alive: bool) -> bool {
        let mut guard = self.alive.write();
        std::mem::replace(&mut *guard, alive)
    }

    pub fn is_alive(&self) -> bool {
        *self.alive.read()
    }

    /// Relay one request. The liveness lock is not held across the call.
    pub async fn forward(&self, request: &UpstreamRequest) -> Result<Response<Body>, ForwardError> {
        self.forwarder.forward(request).await
    }
}
