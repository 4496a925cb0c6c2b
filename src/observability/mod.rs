//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Servers, accept loop, bench harness:
//!     → tracing macros with structured fields
//!     → logging.rs (EnvFilter + fmt subscriber)
//!     → stdout
//! ```
//!
//! # Design Decisions
//! - The adapters themselves never log; their callers do
//! - `RUST_LOG` wins over the configured level

pub mod logging;

pub use logging::init_logging;
