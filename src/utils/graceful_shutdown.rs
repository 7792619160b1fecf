use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use futures_util::stream::StreamExt;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::sync::broadcast;

/// Why the admin server is stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Stop requested (SIGTERM, SIGINT)
    Graceful,
    /// Stop, re-read settings and start again (SIGHUP, `/restart`)
    Restart,
    /// Shutdown channel lost or the server stopped on its own
    Force,
}

/// Fans a single stop or restart request out to every interested task.
pub struct GracefulShutdown {
    shutdown_tx: broadcast::Sender<ShutdownReason>,
    shutdown_initiated: AtomicBool,
    /// How long in-flight requests get to finish once shutdown starts
    drain_timeout: Duration,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(drain_timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            shutdown_tx,
            shutdown_initiated: AtomicBool::new(false),
            drain_timeout,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Relaxed)
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Request a stop or restart. Only the first request is delivered.
    pub fn trigger_shutdown(&self, reason: ShutdownReason) -> bool {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            tracing::info!(?reason, "shutdown triggered");
            let _ = self.shutdown_tx.send(reason);
            true
        } else {
            tracing::warn!(?reason, "shutdown already in progress, ignoring request");
            false
        }
    }

    /// Translate OS signals into shutdown requests until a stop is delivered.
    pub async fn run_signal_handler(&self) -> Result<()> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGHUP])?;

        tracing::info!("signal handler started: SIGTERM/SIGINT stop, SIGHUP restarts");

        while let Some(signal) = signals.next().await {
            let reason = match signal {
                SIGTERM | SIGINT => ShutdownReason::Graceful,
                SIGHUP => ShutdownReason::Restart,
                _ => continue,
            };
            tracing::info!(signal, ?reason, "received signal");

            if self.trigger_shutdown(reason) && reason == ShutdownReason::Graceful {
                break;
            }
        }

        signals.handle().close();
        tracing::info!("signal handler shutting down");
        Ok(())
    }

    pub fn shutdown_token(&self) -> ShutdownToken {
        ShutdownToken {
            receiver: self.subscribe(),
        }
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver for the shutdown request, handed to tasks that must stop.
pub struct ShutdownToken {
    receiver: broadcast::Receiver<ShutdownReason>,
}

impl Clone for ShutdownToken {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.resubscribe(),
        }
    }
}

impl ShutdownToken {
    pub async fn cancelled(&mut self) -> ShutdownReason {
        match self.receiver.recv().await {
            Ok(reason) => reason,
            Err(_) => ShutdownReason::Force,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_shutdown_trigger() {
        let shutdown = GracefulShutdown::new();
        let mut receiver = shutdown.subscribe();

        assert!(shutdown.trigger_shutdown(ShutdownReason::Graceful));

        let reason = receiver.recv().await.unwrap();
        assert_eq!(reason, ShutdownReason::Graceful);
        assert!(shutdown.is_shutdown_initiated());
    }

    #[tokio::test]
    async fn test_only_first_request_is_delivered() {
        let shutdown = GracefulShutdown::new();
        let mut receiver = shutdown.subscribe();

        assert!(shutdown.trigger_shutdown(ShutdownReason::Restart));
        assert!(!shutdown.trigger_shutdown(ShutdownReason::Graceful));

        assert_eq!(receiver.try_recv().unwrap(), ShutdownReason::Restart);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_token() {
        let shutdown = GracefulShutdown::new();
        let mut token = shutdown.shutdown_token();
        assert!(!shutdown.is_shutdown_initiated());

        shutdown.trigger_shutdown(ShutdownReason::Restart);

        assert!(shutdown.is_shutdown_initiated());
        assert_eq!(token.cancelled().await, ShutdownReason::Restart);
    }

    #[tokio::test]
    async fn test_cloned_token_sees_request() {
        let shutdown = GracefulShutdown::new();
        let token = shutdown.shutdown_token();
        let mut cloned = token.clone();

        let waiter = tokio::spawn(async move { cloned.cancelled().await });
        tokio::task::yield_now().await;
        shutdown.trigger_shutdown(ShutdownReason::Graceful);

        assert_eq!(waiter.await.unwrap(), ShutdownReason::Graceful);
    }

    #[tokio::test]
    async fn test_dropped_manager_cancels_as_force() {
        let shutdown = GracefulShutdown::with_timeout(Duration::from_millis(100));
        assert_eq!(shutdown.drain_timeout(), Duration::from_millis(100));
        let mut token = shutdown.shutdown_token();
        drop(shutdown);

        assert_eq!(token.cancelled().await, ShutdownReason::Force);
    }
}
