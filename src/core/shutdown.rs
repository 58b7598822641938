//! # OS termination signals.
//!
//! Unix: `SIGINT`, `SIGTERM`, `SIGQUIT` and Ctrl-C. Elsewhere: Ctrl-C only.

/// Completes when a termination signal arrives.
///
/// Listeners are registered per call. Registration failure is returned as `Err`.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Like [`wait_for_shutdown_signal`], but never completes when the listeners
/// cannot be registered.
pub async fn shutdown_requested() {
    if let Err(e) = wait_for_shutdown_signal().await {
        tracing::warn!(error = %e, "signal handlers unavailable; only restart or task exit stops the device");
        std::future::pending::<()>().await;
    }
}
