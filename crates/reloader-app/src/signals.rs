//! OS signal handling for graceful shutdown

use tokio::sync::watch;

use reloader_core::prelude::*;

/// Spawn a task that flips `shutdown_tx` to `true` on SIGINT/SIGTERM (Ctrl+C
/// on Windows). Every supervised session watching the channel then stops.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(handle_signals(wait_for_signal(), shutdown_tx));
}

/// Flip `shutdown_tx` once `signal` fires.
///
/// The sender stays alive until every receiver is gone, even when signal
/// registration fails, so receivers never see a closed channel as a shutdown.
async fn handle_signals<F>(signal: F, shutdown_tx: watch::Sender<bool>)
where
    F: std::future::Future<Output = Result<()>>,
{
    tokio::select! {
        result = signal => {
            match result {
                Ok(()) => {
                    info!("Shutdown signal received");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => {
                    error!("Signal handler error, Ctrl+C will not stop sessions: {}", e);
                    shutdown_tx.closed().await;
                }
            }
        }
        _ = shutdown_tx.closed() => {
            debug!("All shutdown receivers dropped, signal handler exiting");
        }
    }
}

/// Wait for a termination signal
async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| Error::process(format!("Failed to create SIGINT handler: {}", e)))?;
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| Error::process(format!("Failed to create SIGTERM handler: {}", e)))?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }

        Ok(())
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| Error::process(format!("Failed to listen for Ctrl+C: {}", e)))?;
        info!("Received Ctrl+C");
        Ok(())
    }
}
