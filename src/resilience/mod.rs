//! Resilience subsystem.
//!
//! # Design Decisions
//! - Loops that cannot report errors to a caller (the serve accept loop)
//!   retry with capped exponential backoff instead of spinning
//! - Jitter keeps many retrying tasks from waking in lockstep

pub mod backoff;

pub use backoff::Backoff;
