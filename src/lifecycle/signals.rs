//! OS signal handling.
//!
//! Ctrl-C (SIGINT) triggers a graceful shutdown: the accept loop stops and
//! in-flight handlers are drained.

use crate::lifecycle::Shutdown;

/// Wait for Ctrl-C, then fire the shutdown signal.
pub async fn shutdown_on_ctrl_c(shutdown: &Shutdown) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        }
        Err(e) => tracing::error!(error = %e, "Failed to install Ctrl+C handler"),
    }
}
