//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics. All problems are
//! collected and returned together so an operator can fix a file in one pass.

use thiserror::Error;
use url::Url;

use crate::config::schema::BalancerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no backends configured; provide one or more backends to load balance")]
    NoBackends,

    #[error("backend `{url}` is not a valid URL: {reason}")]
    InvalidBackendUrl { url: String, reason: String },

    #[error("backend `{url}` uses unsupported scheme `{scheme}` (only http is supported)")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("backend `{url}` has no host")]
    MissingHost { url: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Split a comma-delimited backend list, dropping blank entries.
pub fn split_backend_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse one backend entry into a URL the forwarder can use.
pub fn parse_backend_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw).map_err(|e| ValidationError::InvalidBackendUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" {
        return Err(ValidationError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: url.scheme().to_string(),
        });
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::MissingHost {
            url: raw.to_string(),
        });
    }

    Ok(url)
}

/// Validate the configuration, returning the parsed backend URLs in order.
pub fn validate_config(config: &BalancerConfig) -> Result<Vec<Url>, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut urls = Vec::with_capacity(config.backends.len());

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    for raw in &config.backends {
        match parse_backend_url(raw) {
            Ok(url) => urls.push(url),
            Err(e) => errors.push(e),
        }
    }

    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "health_check.interval_secs" });
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "health_check.timeout_secs" });
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::Zero { field: "retries.max_attempts" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.connect_secs" });
    }

    if errors.is_empty() {
        Ok(urls)
    } else {
        Err(errors)
    }
}
