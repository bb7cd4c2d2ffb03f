// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Graceful shutdown: one cancellation signal, tracked background tasks,
//! and a bounded drain.

use std::future::Future;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// Outcome of [`ShutdownCoordinator::initiate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    Timeout { remaining: usize },
}

/// Owns the process-wide cancellation token and every long-lived task.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a task that [`initiate`](Self::initiate) will wait for.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(task = name, "Spawning tracked task");
        self.tracker.spawn(task);
    }

    /// Signal every task and wait up to `timeout` for them to finish.
    pub async fn initiate(&self, timeout: Duration) -> ShutdownResult {
        self.token.cancel();
        self.tracker.close();
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => ShutdownResult::Complete,
            Err(_) => ShutdownResult::Timeout { remaining: self.tracker.len() },
        }
    }
}

/// Serve `router` until `cancel` fires, then drain in-flight requests.
pub async fn serve_until(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    info!(%addr, "Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initiate_waits_for_tasks() {
        let shutdown = ShutdownCoordinator::new();
        let token = shutdown.token();
        shutdown.spawn("waiter", async move { token.cancelled().await });

        let result = shutdown.initiate(Duration::from_secs(1)).await;
        assert_eq!(result, ShutdownResult::Complete);
        assert!(shutdown.is_shutting_down());
    }

    #[tokio::test]
    async fn test_initiate_times_out_on_stuck_task() {
        let shutdown = ShutdownCoordinator::new();
        shutdown.spawn("stuck", async { tokio::time::sleep(Duration::from_secs(30)).await });

        let result = shutdown.initiate(Duration::from_millis(50)).await;
        assert_eq!(result, ShutdownResult::Timeout { remaining: 1 });
    }
}
