//! Graceful shutdown and signal handling.

use crate::error::Result;
use crate::types::Event;
use std::sync::atomic::Ordering;

use super::ImageGenerator;

impl ImageGenerator {
    /// Gracefully shut down the generator
    ///
    /// 1. Stops accepting new requests (`generate*` return `ShuttingDown`)
    /// 2. Waits up to `config.shutdown_grace` for in-flight runs
    /// 3. Emits [`Event::Shutdown`]
    ///
    /// Runs still going after the grace period are left alone, not
    /// cancelled; they finish on the runtime if it keeps running.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        self.tasks.close();
        tracing::info!(in_flight = self.tasks.len(), "Stopped accepting new requests");

        let grace = self.config.shutdown_grace;
        match tokio::time::timeout(grace, self.tasks.wait()).await {
            Ok(()) => {
                tracing::info!("All in-flight runs completed");
            }
            Err(_) => {
                tracing::warn!(
                    still_running = self.tasks.len(),
                    grace_secs = grace.as_secs(),
                    "Grace period elapsed with runs still in flight, leaving them to finish"
                );
            }
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}

/// Run until a termination signal arrives, then shut the generator down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use imagen_dispatch::{Config, ImageGenerator, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let generator = ImageGenerator::new(Config::from_env()?).await?;
///
///     // hand clones of `generator` to the chat front-end here
///
///     run_with_shutdown(generator).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(generator: ImageGenerator) -> Result<()> {
    wait_for_signal().await;
    generator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
