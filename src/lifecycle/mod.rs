//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting on QUIC and TCP → Drain streams → Exit
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl-C) → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One broadcast coordinator shared by every serve loop
//! - Serve loops stop accepting first, then let in-flight RPCs finish

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
