//! OS signal handling.

use crate::lifecycle::shutdown::Shutdown;

/// Wait for an interrupt or termination signal, then trigger shutdown.
pub async fn shutdown_on_signal(shutdown: Shutdown) {
    tokio::select! {
        _ = interrupt() => tracing::info!("Interrupt received"),
        _ = terminate() => tracing::info!("Termination signal received"),
    }
    shutdown.trigger();
}

async fn interrupt() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
}

#[cfg(unix)]
async fn terminate() {
    let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("Failed to install SIGTERM handler");
    signal.recv().await;
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}
