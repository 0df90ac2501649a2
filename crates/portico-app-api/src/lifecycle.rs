//! Process lifecycle
//!
//! Wires OS signals and shutdown timeouts around a [`BackendInitializer`].
//!
//! ```text
//!  SIGINT / SIGTERM ──▶ ShutdownCoordinator ──▶ run_backend
//!                                                 │  start() ─┐ (raced)
//!                                                 │  stop()  ◀┘ bounded by timeout
//!                                                 ▼
//!                                             exit code
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::initializer::BackendInitializer;

/// Shared shutdown flag with async notification
pub struct ShutdownCoordinator {
    /// Shutdown signal flag
    shutdown_signal: AtomicBool,
    /// Notification channel for async waiting
    notify: Notify,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new() -> Self {
        Self {
            shutdown_signal: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Request shutdown and wake every waiter
    pub fn signal_shutdown(&self) {
        if !self.shutdown_signal.swap(true, Ordering::SeqCst) {
            info!("Shutdown signal received");
        }
        self.notify.notify_waiters();
    }

    /// Whether shutdown was requested
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_signal.load(Ordering::SeqCst)
    }

    /// Wait until `signal_shutdown()` is called
    ///
    /// Returns immediately if shutdown was already requested.
    pub async fn wait_for_shutdown(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent signal is not lost
        notified.as_mut().enable();
        if self.is_shutting_down() {
            return;
        }
        notified.await;
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("is_shutting_down", &self.is_shutting_down())
            .finish()
    }
}

/// Spawn a task translating SIGINT (and SIGTERM on unix) into a shutdown request
pub fn listen_for_signals(coordinator: Arc<ShutdownCoordinator>) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        coordinator.signal_shutdown();
    })
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, initiating graceful shutdown"),
        () = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

/// How [`run_backend`] behaves once startup succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Keep running until the coordinator signals shutdown
    #[default]
    UntilShutdown,
    /// Stop as soon as startup (and the root command) completed
    OneShot,
}

/// Drive a backend through start and stop
///
/// Returns the process exit code: 0 for a clean run, 1 when startup failed,
/// shutdown hooks failed or `stop()` exceeded `shutdown_timeout`.
pub async fn run_backend(
    backend: &BackendInitializer,
    coordinator: &ShutdownCoordinator,
    mode: RunMode,
    shutdown_timeout: Duration,
) -> i32 {
    let mut exit_code = EXIT_SUCCESS;

    let started = tokio::select! {
        result = backend.start() => Some(result),
        () = coordinator.wait_for_shutdown() => None,
    };

    match started {
        Some(Ok(())) => {
            if mode == RunMode::UntilShutdown {
                info!("Backend running, waiting for shutdown signal");
                coordinator.wait_for_shutdown().await;
            }
        }
        Some(Err(e)) => {
            error!(error = %e, "Backend failed to start");
            exit_code = EXIT_FAILURE;
        }
        None => warn!("Shutdown requested before startup completed"),
    }

    match tokio::time::timeout(shutdown_timeout, backend.stop()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "Backend failed to stop cleanly");
            exit_code = EXIT_FAILURE;
        }
        Err(_) => {
            error!(
                timeout_secs = shutdown_timeout.as_secs(),
                "Backend did not stop within the shutdown timeout"
            );
            exit_code = EXIT_FAILURE;
        }
    }

    exit_code
}
