//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → BalancerOptions::from_config (runtime options)
//!     → RequestBalancer
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Callbacks (probes, hooks, fatal predicates) are code, never config

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{BalancerConfig, HealthConfig, ObservabilityConfig, PolicyKind, ResolveConfig, RetryMode, RetrySetting};
pub use validation::{validate_config, ValidationError};
