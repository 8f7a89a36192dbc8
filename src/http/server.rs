//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the balancing handler as the only route
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener with graceful shutdown
//! - Start the health checker and the optional admin listener

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, DefaultBodyLimit, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin::{self, AdminState};
use crate::config::{BalancerConfig, ConfigError};
use crate::health::HealthChecker;
use crate::http::forward::{UpstreamClient, UpstreamRequest};
use crate::lifecycle::{startup, ShutdownSignal};
use crate::load_balancer::ServerPool;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::routing::RequestRouter;

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub router: RequestRouter,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: BalancerConfig,
    pool: Arc<ServerPool>,
    client: UpstreamClient,
}

impl HttpServer {
    /// Validate the configuration and assemble the pool and router.
    pub fn new(config: BalancerConfig) -> Result<Self, ConfigError> {
        let (pool, client) = startup::init_pool(&config)?;
        let pool = Arc::new(pool);

        let state = AppState {
            router: RequestRouter::new(pool.clone(), RetryPolicy::from(&config.retries)),
        };

        Ok(Self {
            router: Self::build_router(state, config.limits.max_body_size),
            config,
            pool,
            client,
        })
    }

    fn build_router(state: AppState, max_body_size: usize) -> Router {
        Router::new()
            .route("/", any(balance_handler))
            .route("/{*path}", any(balance_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(max_body_size))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.pool.len(),
            "Load balancer started"
        );

        if self.config.health_check.enabled {
            let checker = HealthChecker::from_config(
                self.pool.clone(),
                &self.config.health_check,
                self.client.clone(),
            );
            tokio::spawn(checker.run(shutdown.clone()));
        }

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            let state = AdminState::new(self.pool.clone(), &self.config.admin.api_key);
            let admin_shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = admin::serve(admin_listener, state, admin_shutdown).await {
                    tracing::error!(error = %e, "Admin server failed");
                }
            });
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut graceful = shutdown;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn pool(&self) -> Arc<ServerPool> {
        self.pool.clone()
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }
}

/// Buffer the request body, then hand the request to the router.
///
/// Bodies over the limit are answered with 413, other body read failures
/// with 400. Neither reaches a backend.
async fn balance_handler(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();

    let body = match body {
        Ok(bytes) => bytes,
        Err(rejection) => {
            let status = rejection.status();
            let outcome = if status == StatusCode::PAYLOAD_TOO_LARGE {
                "rejected"
            } else {
                "bad_request"
            };
            tracing::warn!(
                client = %client_addr,
                path = %uri.path(),
                status = %status,
                error = %rejection.body_text(),
                "Failed to read request body"
            );
            metrics::record_request(outcome, start);
            return rejection.into_response();
        }
    };

    let request = UpstreamRequest::new(method, uri, headers, body, Some(client_addr));
    match state.router.route(&request).await {
        Ok(response) => {
            metrics::record_request("ok", start);
            response
        }
        Err(e) => {
            metrics::record_request("unavailable", start);
            e.into_response()
        }
    }
}
