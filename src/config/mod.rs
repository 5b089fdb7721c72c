//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → each section handed to the component it configures
//! ```
//!
//! # Design Decisions
//! - Config is construction-time only; nothing is reloaded while serving
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Components re-validate their own section so they cannot be built
//!   from a self-contradictory config, even outside the loader

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BackendConfig, CircuitBreakerConfig, GuardConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, QueueConfig, RateLimitConfig, StatusRange, StrategyKind, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
