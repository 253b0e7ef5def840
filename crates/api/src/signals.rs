//! Termination triggers.
//!
//! The service stops on SIGINT, SIGTERM or SIGQUIT (Ctrl-C elsewhere), or when
//! the error aggregator halts it. Both paths cancel one token; the binary
//! runs the shutdown sequence once, after that token fires.

use tokio_util::sync::CancellationToken;

/// Waits for a termination signal.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

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

/// Waits for a termination signal.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Cancel `terminate` on the first OS signal or when `halted` fires.
pub async fn watch_termination(terminate: CancellationToken, halted: CancellationToken) {
    tokio::select! {
        result = wait_for_shutdown_signal() => match result {
            Ok(()) => tracing::info!("Received shutdown signal, draining..."),
            Err(e) => {
                tracing::error!(error = %e, "Signal registration failed; only a halt can stop the service");
                halted.cancelled().await;
                tracing::warn!("Service halted by the error aggregator, draining...");
            }
        },
        _ = halted.cancelled() => {
            tracing::warn!("Service halted by the error aggregator, draining...");
        }
    }
    terminate.cancel();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_halt_triggers_termination() {
        let terminate = CancellationToken::new();
        let halted = CancellationToken::new();
        let watcher = tokio::spawn(watch_termination(terminate.clone(), halted.clone()));

        assert!(!terminate.is_cancelled());
        halted.cancel();

        tokio::time::timeout(Duration::from_secs(1), terminate.cancelled())
            .await
            .expect("halt must trigger termination");
        watcher.await.unwrap();
    }
}
