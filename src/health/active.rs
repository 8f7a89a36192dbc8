//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend
//! - Overwrite each backend's liveness with the probe result

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use tokio::net::TcpStream;
use tokio::time::{self, MissedTickBehavior};
use url::{Position, Url};

use crate::config::HealthCheckConfig;
use crate::http::forward::{join_paths, UpstreamClient};
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::ServerPool;
use crate::observability::metrics;

/// Reachability check for one backend. Failures are `false`, never errors.
#[async_trait]
pub trait Probe: Send + Sync + fmt::Debug {
    async fn probe(&self, target: &Url) -> bool;
}

/// Reachable if a TCP connection can be opened (and is immediately dropped).
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, target: &Url) -> bool {
        let Some(host) = target.host_str() else {
            return false;
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = target.port_or_known_default().unwrap_or(80);

        match time::timeout(self.timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::debug!(backend = %target, error = %e, "Health probe: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %target, "Health probe: timeout");
                false
            }
        }
    }
}

/// Reachable if `GET <backend><path>` answers with a 2xx status.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: UpstreamClient,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(client: UpstreamClient, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            path: path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, target: &Url) -> bool {
        let authority = &target[Position::BeforeHost..Position::AfterPort];
        let path = join_paths(target.path(), &self.path);
        let uri = format!("{}://{}{}", target.scheme(), authority, path);

        let request = match Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "rr-balancer-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(backend = %target, error = %e, "Failed to build health check request");
                return false;
            }
        };

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::debug!(backend = %target, status = %response.status(), "Health probe: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(backend = %target, error = %e, "Health probe: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %target, "Health probe: timeout");
                false
            }
        }
    }
}

/// Background task that sweeps the pool on a fixed interval.
#[derive(Debug)]
pub struct HealthChecker {
    pool: Arc<ServerPool>,
    probe: Arc<dyn Probe>,
    interval: Duration,
}

impl HealthChecker {
    pub fn new(pool: Arc<ServerPool>, probe: Arc<dyn Probe>, interval: Duration) -> Self {
        Self {
            pool,
            probe,
            interval,
        }
    }

    /// TCP probing by default; HTTP probing when a path is configured.
    pub fn from_config(pool: Arc<ServerPool>, config: &HealthCheckConfig, client: UpstreamClient) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let probe: Arc<dyn Probe> = match &config.path {
            Some(path) => Arc::new(HttpProbe::new(client, path.clone(), timeout)),
            None => Arc::new(TcpProbe::new(timeout)),
        };
        Self::new(pool, probe, Duration::from_secs(config.interval_secs))
    }

    /// Sweep until shutdown. Sweeps never overlap: a slow sweep delays the
    /// next tick instead of queueing extra ones.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        tracing::info!(interval = ?self.interval, "Health checker starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Health checker received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once, in pool order.
    pub async fn sweep(&self) {
        tracing::debug!("Starting health check sweep");

        for backend in self.pool.backends() {
            let alive = self.probe.probe(backend.url()).await;
            let was_alive = backend.set_alive(alive);

            if was_alive != alive {
                tracing::warn!(
                    backend = %backend.url(),
                    alive,
                    "Backend liveness changed"
                );
            }
            tracing::info!(
                backend = %backend.url(),
                status = if alive { "up" } else { "down" },
                "Health check"
            );
            metrics::record_backend_alive(backend.url().as_str(), alive);
        }

        tracing::debug!("Health check sweep completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::load_balancer::testing::{pool_of, url};
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;
    use tokio::net::TcpListener;

    /// Probe answering from a mutable set of down ports.
    #[derive(Debug, Default)]
    struct ScriptedProbe {
        down: Mutex<HashSet<u16>>,
        probes: AtomicUsize,
    }

    impl ScriptedProbe {
        fn set_down(&self, port: u16, down: bool) {
            let mut set = self.down.lock();
            if down {
                set.insert(port);
            } else {
                set.remove(&port);
            }
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn probe(&self, target: &Url) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            !self.down.lock().contains(&target.port().unwrap_or(80))
        }
    }

    fn checker(pool: Arc<ServerPool>, probe: Arc<ScriptedProbe>) -> HealthChecker {
        HealthChecker::new(pool, probe, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_sweep_marks_failing_backend_down() {
        let pool = Arc::new(pool_of(3));
        let probe = Arc::new(ScriptedProbe::default());
        probe.set_down(9001, true);
        let checker = checker(pool.clone(), probe.clone());

        checker.sweep().await;

        let alive: Vec<bool> = pool.backends().iter().map(|b| b.is_alive()).collect();
        assert_eq!(alive, vec![true, false, true]);
        assert_eq!(probe.probes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_sweep_overwrites_regardless_of_previous_state() {
        let pool = Arc::new(pool_of(2));
        let probe = Arc::new(ScriptedProbe::default());
        let checker = checker(pool.clone(), probe.clone());

        // marked dead by the failover path, probe says reachable
        pool.change_backend_status(&url(9000), false);
        checker.sweep().await;
        assert!(pool.backends()[0].is_alive());

        probe.set_down(9000, true);
        checker.sweep().await;
        assert!(!pool.backends()[0].is_alive());
        // second failing cycle keeps it down
        checker.sweep().await;
        assert!(!pool.backends()[0].is_alive());

        probe.set_down(9000, false);
        checker.sweep().await;
        assert!(pool.backends()[0].is_alive());
    }

    #[tokio::test]
    async fn test_run_sweeps_until_shutdown() {
        let pool = Arc::new(pool_of(2));
        let probe = Arc::new(ScriptedProbe::default());
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(checker(pool, probe.clone()).run(shutdown.subscribe()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

        // first tick is immediate, more follow every 10ms
        assert!(probe.probes.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn test_tcp_probe() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap();
        let closed = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap()
        };

        let probe = TcpProbe::new(Duration::from_secs(1));
        assert!(probe.probe(&Url::parse(&format!("http://{}", open)).unwrap()).await);
        assert!(!probe.probe(&Url::parse(&format!("http://{}", closed)).unwrap()).await);
    }

    async fn serve_status(status_line: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let response = format!("HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status_line);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_http_probe_requires_success_status() {
        let client = crate::http::forward::build_client(Duration::from_secs(1));
        let probe = HttpProbe::new(client, "/health", Duration::from_secs(1));

        assert!(probe.probe(&serve_status("200 OK").await).await);
        assert!(!probe.probe(&serve_status("500 Internal Server Error").await).await);
    }

    /// Answer 200 once and report the request line that was received.
    async fn record_request_line() -> (Url, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let head = String::from_utf8_lossy(&buf).to_string();
            let _ = tx.send(head.lines().next().unwrap_or("").to_string());
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
            let _ = socket.shutdown().await;
        });
        (Url::parse(&format!("http://{}", addr)).unwrap(), rx)
    }

    #[tokio::test]
    async fn test_http_probe_joins_backend_base_path() {
        let client = crate::http::forward::build_client(Duration::from_secs(1));
        let probe = HttpProbe::new(client, "/health", Duration::from_secs(1));

        let (base, rx) = record_request_line().await;
        let target = base.join("/api").unwrap();
        assert!(probe.probe(&target).await);
        assert_eq!(rx.await.unwrap(), "GET /api/health HTTP/1.1");

        let (root, rx) = record_request_line().await;
        assert!(probe.probe(&root).await);
        assert_eq!(rx.await.unwrap(), "GET /health HTTP/1.1");
    }

    #[tokio::test]
    async fn test_from_config_picks_probe() {
        let pool = Arc::new(pool_of(1));
        let client = crate::http::forward::build_client(Duration::from_secs(1));

        let tcp = HealthChecker::from_config(pool.clone(), &HealthCheckConfig::default(), client.clone());
        assert!(format!("{:?}", tcp.probe).contains("TcpProbe"));

        let config = HealthCheckConfig {
            path: Some("/healthz".into()),
            ..Default::default()
        };
        let http = HealthChecker::from_config(pool, &config, client);
        assert!(format!("{:?}", http.probe).contains("HttpProbe"));
        assert_eq!(http.interval, Duration::from_secs(10));
    }
}
