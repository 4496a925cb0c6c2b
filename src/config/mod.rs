//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), or built-in defaults
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → server / bench client construct their transports from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Every address is a plain field with a loopback or wildcard default
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    AppConfig, BenchConfig, ClientConfig, ObservabilityConfig, QuicConfig, ServerConfig,
    TlsConfig,
};
