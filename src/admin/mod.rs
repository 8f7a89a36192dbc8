//! Admin status surface.
//!
//! Served on its own listener so it never competes with the balanced
//! catch-all route.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;

use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::ServerPool;

use self::auth::admin_auth_middleware;
use self::handlers::{get_backends, get_status};

/// Shared state for admin handlers.
#[derive(Debug, Clone)]
pub struct AdminState {
    pub pool: Arc<ServerPool>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(pool: Arc<ServerPool>, api_key: &str) -> Self {
        Self {
            pool,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin router until shutdown.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin server listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
