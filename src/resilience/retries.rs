//! Retry and failover limits.
//!
//! # Responsibilities
//! - Bound same-backend retries after a forwarding failure
//! - Bound the number of distinct backends tried for one request
//! - Track both counters for one request as an explicit value
//!
//! # Design Decisions
//! - Fixed backoff between same-backend retries, no jitter
//! - Retry counter resets whenever routing moves to another backend
//! - Counters live only as long as the request; nothing is shared

use std::time::Duration;

use crate::config::RetryConfig;

/// Ceilings for the retry/failover protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Distinct backends a request may try.
    pub max_attempts: u32,
    /// Same-backend retries before the backend is marked dead.
    pub max_retries: u32,
    /// Pause before each same-backend retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_retries: 3,
            backoff: Duration::from_millis(10),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

/// Per-request counters. Starts at one attempt and zero retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptState {
    pub attempts: u32,
    pub retries: u32,
}

impl Default for AttemptState {
    fn default() -> Self {
        Self {
            attempts: 1,
            retries: 0,
        }
    }
}

impl AttemptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the request has used up every allowed backend.
    pub fn attempts_exhausted(&self, policy: &RetryPolicy) -> bool {
        self.attempts > policy.max_attempts
    }

    /// True while the current backend may be retried again.
    pub fn can_retry(&self, policy: &RetryPolicy) -> bool {
        self.retries < policy.max_retries
    }

    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    /// Move on to a different backend.
    pub fn fail_over(&mut self) {
        self.attempts += 1;
        self.retries = 0;
    }
}
