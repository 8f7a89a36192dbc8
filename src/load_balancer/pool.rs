//! Backend pool management.
//!
//! # Responsibilities
//! - Hold the ordered, append-only list of backends
//! - Rotate through them with a shared atomic cursor
//! - Skip backends whose liveness flag is down

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use url::Url;

use crate::load_balancer::backend::Backend;

/// Ordered set of backends plus the round-robin cursor.
///
/// Backends are added during startup through `&mut self`; once the pool is
/// shared behind an `Arc` the list is immutable and iterated without a lock.
#[derive(Debug, Default)]
pub struct ServerPool {
    backends: Vec<Arc<Backend>>,
    current: AtomicUsize,
}

impl ServerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a backend. Duplicate URLs are not detected.
    pub fn add_backend(&mut self, backend: Backend) {
        self.backends.push(Arc::new(backend));
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Raw cursor value.
    pub fn cursor(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// Advance the cursor by one and map the new value onto the backend list.
    ///
    /// The cursor wraps on overflow. Callers check for an empty pool first.
    pub(crate) fn next_index(&self) -> usize {
        let advanced = self.current.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        advanced % self.backends.len()
    }

    /// Select the next alive backend, or `None` when every backend is down.
    ///
    /// When dead backends had to be skipped the cursor is moved to the chosen
    /// index, so the following call starts right after it.
    pub fn get_next_peer(&self) -> Option<Arc<Backend>> {
        if self.backends.is_empty() {
            return None;
        }

        let len = self.backends.len();
        let start = self.next_index();

        for offset in 0..len {
            let index = (start + offset) % len;
            let backend = &self.backends[index];
            if backend.is_alive() {
                if offset != 0 {
                    self.current.store(index, Ordering::SeqCst);
                }
                tracing::debug!(backend = %backend.url(), index, "Selected peer");
                return Some(backend.clone());
            }
        }

        tracing::debug!(backend_count = len, "No alive backend in pool");
        None
    }

    /// Set the liveness flag of the first backend with this URL.
    pub fn change_backend_status(&self, url: &Url, alive: bool) {
        match self.backends.iter().find(|b| b.url() == url) {
            Some(backend) => {
                let was_alive = backend.set_alive(alive);
                if was_alive != alive {
                    tracing::warn!(
                        backend = %url,
                        alive,
                        "Backend status changed"
                    );
                }
            }
            None => {
                tracing::debug!(backend = %url, "Status change for unknown backend ignored");
            }
        }
    }
}
