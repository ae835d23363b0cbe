//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → config file (TOML, optional)
//!     → .env / process environment (PORT, SHUTDOWN_TIMEOUT, ...)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DatabaseConfig, ListenerConfig, LogFormat, ObservabilityConfig, ServerConfig, TimeoutConfig,
    UploadConfig,
};
