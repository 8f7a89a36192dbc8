//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (main.rs)
//!     → validation.rs (semantic checks, backend URL parsing)
//!     → BalancerConfig + Vec<Url> (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the backend list is fixed for the
//!   lifetime of the process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BalancerConfig, HealthCheckConfig, LimitsConfig, ListenerConfig,
    ObservabilityConfig, RetryConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
