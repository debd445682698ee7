use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use eyre::{Result, WrapErr};
use tokio::{signal, sync::watch};

/// Exit status used when a second termination signal arrives mid-shutdown.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Represents different shutdown reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT (Ctrl+C)
    Interrupt,
    /// SIGTERM
    Terminate,
    /// Triggered programmatically
    Requested,
}

/// Single-fire shutdown signal shared by the accept loop and the drain routine.
///
/// The first trigger wins; the reason is retained so subscribers created after
/// the fact still observe it.
pub struct GracefulShutdown {
    shutdown_tx: watch::Sender<Option<ShutdownReason>>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(None);
        Self {
            shutdown_tx,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a token resolving once shutdown begins
    pub fn subscribe(&self) -> ShutdownToken {
        ShutdownToken {
            receiver: self.shutdown_tx.subscribe(),
            shutdown_initiated: self.shutdown_initiated.clone(),
        }
    }

    /// Check if shutdown has been initiated
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Acquire)
    }

    /// Trigger shutdown. Returns `false` if a shutdown was already in progress.
    pub fn trigger_shutdown(&self, reason: ShutdownReason) -> bool {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::info!(?reason, "Shutdown initiated");
            self.shutdown_tx.send_replace(Some(reason));
            true
        } else {
            false
        }
    }

    /// Listen for SIGINT/SIGTERM for the whole process lifetime.
    ///
    /// The first signal starts the graceful sequence. Any later signal means the
    /// operator gave up waiting, so the process exits with [`FORCED_EXIT_CODE`].
    pub async fn run_signal_handler(&self) -> Result<()> {
        let mut sigterm = TerminateSignal::register()?;
        tracing::info!("Signal handler started. Listening for SIGINT and SIGTERM");

        loop {
            let reason = tokio::select! {
                res = signal::ctrl_c() => {
                    res.wrap_err("Failed to listen for SIGINT")?;
                    ShutdownReason::Interrupt
                }
                _ = sigterm.recv() => ShutdownReason::Terminate,
            };

            if !self.trigger_shutdown(reason) {
                tracing::warn!(
                    ?reason,
                    "Received another termination signal during shutdown, forcing exit"
                );
                std::process::exit(FORCED_EXIT_CODE);
            }
        }
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A token that can be used to wait for, or poll, the shutdown signal
#[derive(Clone)]
pub struct ShutdownToken {
    receiver: watch::Receiver<Option<ShutdownReason>>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Acquire)
    }

    /// Reason of the shutdown, if one has started
    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.receiver.borrow()
    }

    /// Resolve once shutdown begins. A dropped sender counts as a request.
    pub async fn wait(mut self) -> ShutdownReason {
        match self.receiver.wait_for(Option::is_some).await {
            Ok(reason) => (*reason).unwrap_or(ShutdownReason::Requested),
            Err(_) => ShutdownReason::Requested,
        }
    }
}

#[cfg(unix)]
struct TerminateSignal(signal::unix::Signal);

#[cfg(unix)]
impl TerminateSignal {
    fn register() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        let sigterm = signal(SignalKind::terminate()).wrap_err("Failed to register SIGTERM handler")?;
        Ok(Self(sigterm))
    }

    async fn recv(&mut self) {
        self.0.recv().await;
    }
}

// On non-Unix systems, we only have Ctrl+C
#[cfg(not(unix))]
struct TerminateSignal;

#[cfg(not(unix))]
impl TerminateSignal {
    fn register() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_graceful_shutdown_creation() {
        let shutdown = GracefulShutdown::new();
        assert!(!shutdown.is_shutdown_initiated());
        assert!(shutdown.subscribe().reason().is_none());
    }

    #[tokio::test]
    async fn test_trigger_is_single_fire() {
        let shutdown = GracefulShutdown::new();

        assert!(shutdown.trigger_shutdown(ShutdownReason::Terminate));
        assert!(!shutdown.trigger_shutdown(ShutdownReason::Interrupt));
        assert!(shutdown.is_shutdown_initiated());

        // The first reason is kept
        assert_eq!(shutdown.subscribe().reason(), Some(ShutdownReason::Terminate));
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_signal() {
        let shutdown = GracefulShutdown::new();
        shutdown.trigger_shutdown(ShutdownReason::Interrupt);

        let token = shutdown.subscribe();
        let reason = timeout(Duration::from_millis(100), token.wait())
            .await
            .unwrap();
        assert_eq!(reason, ShutdownReason::Interrupt);
    }

    #[tokio::test]
    async fn test_token_wakes_waiters() {
        let shutdown = Arc::new(GracefulShutdown::new());
        let first = shutdown.subscribe();
        let second = first.clone();

        let waiter = tokio::spawn(async move { (first.wait().await, second.wait().await) });
        tokio::task::yield_now().await;
        shutdown.trigger_shutdown(ShutdownReason::Requested);

        let (a, b) = timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(a, ShutdownReason::Requested);
        assert_eq!(b, ShutdownReason::Requested);
    }
}
