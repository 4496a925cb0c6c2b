//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for Ctrl-C (SIGINT)
//! - Translate it into a [`Shutdown`] trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A failed handler registration is logged and never triggers shutdown

use crate::lifecycle::Shutdown;

/// Trigger `shutdown` on the first Ctrl-C.
pub async fn wait_for_ctrl_c(shutdown: Shutdown) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Ctrl-C received, shutting down");
            shutdown.trigger();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    }
}
