//! Request routing with retry and failover.
//!
//! # Responsibilities
//! - Pick a peer from the pool for each inbound request
//! - Retry the same peer a bounded number of times on forwarding failure
//! - Mark an exhausted peer dead and fail over to another one
//! - Turn pool exhaustion and the attempt ceiling into 503 responses
//!
//! # State Machine
//! ```text
//! (attempts=1, retries=0)
//!   → attempts > max_attempts ............ AttemptCeilingReached
//!   → pool has no alive peer ............. PoolExhausted
//!   → forward ok ......................... response
//!   → forward failed, retries < max ...... sleep, retries+1, same peer
//!   → forward failed, retries exhausted .. mark dead, attempts+1, retries=0, re-select
//! ```

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use thiserror::Error;

use crate::http::forward::UpstreamRequest;
use crate::load_balancer::ServerPool;
use crate::observability::metrics;
use crate::resilience::{AttemptState, RetryPolicy};

/// Terminal routing failures. Both render as the same 503 response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("no alive backend available")]
    PoolExhausted,

    #[error("gave up after {attempts} attempts")]
    AttemptCeilingReached { attempts: u32 },
}

impl IntoResponse for RouteError {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::SERVICE_UNAVAILABLE, "service not available").into_response()
    }
}

/// Entry point for every proxied request.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    pool: Arc<ServerPool>,
    policy: RetryPolicy,
}

impl RequestRouter {
    pub fn new(pool: Arc<ServerPool>, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    /// Route one request to completion.
    pub async fn route(&self, request: &UpstreamRequest) -> Result<Response<Body>, RouteError> {
        let mut state = AttemptState::new();

        loop {
            if state.attempts_exhausted(&self.policy) {
                tracing::warn!(
                    method = %request.method,
                    path = %request.uri.path(),
                    attempts = state.attempts,
                    "Max attempts reached, terminating"
                );
                return Err(RouteError::AttemptCeilingReached {
                    attempts: state.attempts,
                });
            }

            let Some(peer) = self.pool.get_next_peer() else {
                tracing::warn!(
                    method = %request.method,
                    path = %request.uri.path(),
                    attempts = state.attempts,
                    "No alive backend available"
                );
                return Err(RouteError::PoolExhausted);
            };

            let backend = peer.url().as_str();
            tracing::debug!(
                backend = %backend,
                attempts = state.attempts,
                path = %request.uri.path(),
                "Forwarding request"
            );

            loop {
                match peer.forward(request).await {
                    Ok(response) => return Ok(response),
                    Err(e) => {
                        tracing::warn!(
                            backend = %backend,
                            error = %e,
                            attempts = state.attempts,
                            retries = state.retries,
                            "Forwarding failed"
                        );
                        if !state.can_retry(&self.policy) {
                            break;
                        }
                        tokio::time::sleep(self.policy.backoff).await;
                        state.record_retry();
                        metrics::record_retry(backend);
                    }
                }
            }

            self.pool.change_backend_status(peer.url(), false);
            metrics::record_failover(backend);
            metrics::record_backend_alive(backend, false);
            state.fail_over();
            tracing::info!(
                backend = %backend,
                attempts = state.attempts,
                path = %request.uri.path(),
                "Backend marked down, attempting another peer"
            );
        }
    }
}
