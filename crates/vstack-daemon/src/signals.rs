//! Translate OS shutdown signals into a [`ShutdownSignal`] trigger (§9
//! "a shared cancellation token derived from `shutdown_flag`"). Both
//! Ctrl-C and `SIGTERM` should produce the same graceful-shutdown path.

use vstack_harness::shutdown::ShutdownSignal;

/// Wait for either Ctrl-C or, on Unix, `SIGTERM`, then trigger `shutdown`.
/// Intended to be spawned once per daemon process.
pub async fn wait_and_trigger(shutdown: ShutdownSignal) {
    wait_for_signal().await;
    tracing::info!("shutdown signal received");
    shutdown.trigger();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGTERM handler");
            // Fall back to ctrl_c alone rather than panic on a signal
            // installation failure.
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
