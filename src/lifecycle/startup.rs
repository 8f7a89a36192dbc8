//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration (fatal on any error)
//! - Build the server pool with one forwarder per backend
//!
//! Listener binding and background tasks are started by `HttpServer::run`,
//! so traffic is only accepted once the pool exists.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::{validate_config, BalancerConfig, ConfigError, TimeoutConfig};
use crate::http::forward::{build_client, HttpForwarder, UpstreamClient};
use crate::load_balancer::{Backend, ServerPool};

/// Build a pool over already-validated backend URLs, in order.
pub fn build_pool(urls: Vec<Url>, client: &UpstreamClient, timeouts: &TimeoutConfig) -> ServerPool {
    let request_timeout = Duration::from_secs(timeouts.request_secs);
    let mut pool = ServerPool::new();

    for url in urls {
        let forwarder = HttpForwarder::new(url.clone(), client.clone(), request_timeout);
        tracing::info!(backend = %url, "Configured backend");
        pool.add_backend(Backend::new(url, Arc::new(forwarder)));
    }

    pool
}

/// Validate the configuration and construct the pool plus the shared client.
pub fn init_pool(config: &BalancerConfig) -> Result<(ServerPool, UpstreamClient), ConfigError> {
    let urls = validate_config(config)?;
    let client = build_client(Duration::from_secs(config.timeouts.connect_secs));
    let pool = build_pool(urls, &client, &config.timeouts);
    Ok((pool, client))
}
