// Signal handling module
//
// SIGTERM and SIGINT (Ctrl+C) both request a graceful shutdown: the accept
// loop stops and the process exits once the runtime is dropped.

use crate::logger;

/// Resolve when the process is asked to stop
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            logger::log_warning(&format!("Failed to register SIGTERM handler: {e}"));
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => logger::log_warning("SIGTERM received"),
        () = wait_for_ctrl_c() => {}
    }
}

/// Non-Unix fallback: only Ctrl+C is handled
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => logger::log_warning("SIGINT received"),
        Err(e) => {
            logger::log_error(&format!("Failed to listen for Ctrl+C: {e}"));
            // Never resolve: without a handler the process runs until killed
            std::future::pending::<()>().await;
        }
    }
}
