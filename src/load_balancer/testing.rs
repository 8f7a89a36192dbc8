//! Test doubles shared by the load balancer and routing tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Response, StatusCode};
use url::Url;

use crate::http::forward::UpstreamRequest;
use crate::load_balancer::backend::{Backend, Forward, ForwardError};
use crate::load_balancer::pool::ServerPool;

/// Forwarder that fails a fixed number of times and then answers 200.
#[derive(Debug)]
pub struct ScriptedForwarder {
    failures: usize,
    calls: AtomicUsize,
}

impl ScriptedForwarder {
    pub fn ok() -> Arc<Self> {
        Self::failing_then_ok(0)
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing_then_ok(usize::MAX)
    }

    pub fn failing_then_ok(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Forward for ScriptedForwarder {
    async fn forward(&self, _request: &UpstreamRequest) -> Result<Response<Body>, ForwardError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ForwardError::Upstream("connection refused".into()));
        }
        Response::builder()
            .status(StatusCode::OK)
            .body(Body::from("ok"))
            .map_err(|e| ForwardError::InvalidRequest(e.to_string()))
    }
}

pub fn request() -> UpstreamRequest {
    UpstreamRequest::new(
        Method::GET,
        "/".parse().unwrap(),
        HeaderMap::new(),
        Bytes::new(),
        None,
    )
}

pub fn url(port: u16) -> Url {
    Url::parse(&format!("http://127.0.0.1:{}", port)).unwrap()
}

pub fn backend(raw: &str) -> Backend {
    Backend::new(Url::parse(raw).unwrap(), ScriptedForwarder::ok())
}

/// Pool of `n` always-succeeding backends on ports 9000, 9001, ...
pub fn pool_of(n: u16) -> ServerPool {
    let mut pool = ServerPool::new();
    for i in 0..n {
        pool.add_backend(Backend::new(url(9000 + i), ScriptedForwarder::ok()));
    }
    pool
}

/// Pool whose backends use the given forwarders, in order.
pub fn pool_with(forwarders: &[Arc<ScriptedForwarder>]) -> ServerPool {
    let mut pool = ServerPool::new();
    for (i, forwarder) in forwarders.iter().enumerate() {
        pool.add_backend(Backend::new(url(9000 + i as u16), forwarder.clone()));
    }
    pool
}
