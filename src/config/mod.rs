//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! inlet.toml (+ include_config_files)
//!     → loader.rs (parse, merge address/graphs from includes)
//!     → validation.rs (semantic checks, registry dry run)
//!     → InletConfig (validated, immutable)
//!     → lifecycle::startup builds the runtime state from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AddressConfig, GraphConfig, HooksConfig, HttpConfig, InletConfig, ObservabilityConfig,
    RendererConfig,
};
pub use validation::{validate_config, ValidationError};
