//! Graceful shutdown with signal handling

use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Shutdown signal broadcaster
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    sender: Arc<broadcast::Sender<()>>,
}

impl ShutdownSignal {
    /// Create a new shutdown signal
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to shutdown notifications
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Trigger shutdown
    pub fn trigger(&self) {
        let _ = self.sender.send(());
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener for OS termination signals
#[derive(Debug)]
pub struct SignalHandler {
    signal: ShutdownSignal,
}

impl SignalHandler {
    /// Create a new signal handler feeding `signal`
    pub fn new(signal: ShutdownSignal) -> Self {
        Self { signal }
    }

    /// Wait for SIGTERM/SIGINT (or Ctrl+C elsewhere) and trigger shutdown
    pub async fn run(self) {
        #[cfg(unix)]
        {
            use signal::unix::{signal, SignalKind};

            let sigterm = signal(SignalKind::terminate());
            let sigint = signal(SignalKind::interrupt());

            let (mut sigterm, mut sigint) = match (sigterm, sigint) {
                (Ok(t), Ok(i)) => (t, i),
                (t, i) => {
                    error!(
                        sigterm_ok = t.is_ok(),
                        sigint_ok = i.is_ok(),
                        "Failed to install termination signal handlers"
                    );
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                    self.signal.trigger();
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT");
                    self.signal.trigger();
                }
            }
        }

        #[cfg(not(unix))]
        {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C");
                    self.signal.trigger();
                }
                Err(err) => {
                    error!("Failed to listen for Ctrl+C: {}", err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_signal_delivery() {
        let signal = ShutdownSignal::new();
        let mut rx = signal.subscribe();

        signal.trigger();
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_signal_multiple_subscribers() {
        let signal = ShutdownSignal::new();
        let mut rx1 = signal.subscribe();
        let mut rx2 = signal.subscribe();

        signal.trigger();

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_trigger_without_subscribers_does_not_panic() {
        let signal = ShutdownSignal::new();
        signal.trigger();
    }
}
