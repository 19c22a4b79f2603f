//! Task runner - main worker loop

use crate::error::Result;
use crate::queue::TaskStore;
use crate::task::WorkerId;
use crate::worker::{recover_stale_tasks, Dispatcher, Outcome, WorkerConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info};

/// Task runner that polls the task store and dispatches claimed tasks
pub struct TaskRunner {
    store: Arc<dyn TaskStore>,
    dispatcher: Dispatcher,
    config: WorkerConfig,
    worker_id: WorkerId,
    shutdown: Arc<AtomicBool>,
}

impl TaskRunner {
    /// Create a new task runner
    pub fn new(
        store: Arc<dyn TaskStore>,
        dispatcher: Dispatcher,
        config: WorkerConfig,
        worker_id: WorkerId,
    ) -> Self {
        Self {
            store,
            dispatcher,
            config,
            worker_id,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Get a handle to signal shutdown
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Requeue tasks orphaned by workers that died mid-task
    pub async fn recover(&self) -> usize {
        info!("[{}] Checking for stale tasks...", self.worker_id);
        recover_stale_tasks(self.store.as_ref(), self.config.stale_after).await
    }

    /// Main worker loop
    ///
    /// Runs stale-task recovery once, then polls for pending tasks until
    /// shutdown is signaled. Shutdown is checked between tasks only.
    pub async fn run(&self) -> Result<()> {
        info!("[{}] Starting grant worker...", self.worker_id);
        info!("[{}] Poll interval: {:?}", self.worker_id, self.config.poll_interval);
        info!("[{}] Stale threshold: {:?}", self.worker_id, self.config.stale_after);
        match self.config.task_timeout {
            Some(timeout) => info!("[{}] Task timeout: {:?}", self.worker_id, timeout),
            None => info!("[{}] Task timeout: none", self.worker_id),
        }

        self.recover().await;

        loop {
            // Check for shutdown signal
            if self.shutdown.load(Ordering::Relaxed) {
                info!("[{}] Shutdown signal received, stopping worker...", self.worker_id);
                break;
            }

            if !self.process_one_task().await {
                sleep(self.config.poll_interval).await;
            }
        }

        info!("[{}] Worker stopped", self.worker_id);
        Ok(())
    }

    /// Claim and dispatch a single task
    ///
    /// Returns false when there was nothing to do. A claim error is logged
    /// and counts as no task.
    pub async fn process_one_task(&self) -> bool {
        let task = match self.store.claim_next_task(&self.worker_id).await {
            Ok(Some(task)) => task,
            Ok(None) => return false,
            Err(e) => {
                error!("[{}] Error claiming task: {}", self.worker_id, e);
                return false;
            }
        };

        info!(
            "[{}] Processing task {} ({})",
            self.worker_id, task.id, task.task_type
        );

        match self.dispatcher.dispatch(&task).await {
            Ok(Outcome::Success(_)) => {
                info!("[{}] Task {} completed", self.worker_id, task.id);
            }
            Ok(Outcome::Failure(message)) => {
                error!("[{}] Task {} failed: {}", self.worker_id, task.id, message);
            }
            Err(e) => {
                error!(
                    "[{}] Could not record outcome of task {}: {}",
                    self.worker_id, task.id, e
                );
            }
        }

        true
    }

    /// Recover stale tasks, then process at most one task (for --once)
    pub async fn run_once(&self) -> bool {
        info!("[{}] Running worker in single-task mode...", self.worker_id);
        self.recover().await;
        self.process_one_task().await
    }
}

/// Setup signal handlers for graceful shutdown
///
/// Ctrl+C, and SIGTERM on Unix, set the shutdown flag.
pub fn setup_signal_handler(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if shutdown_signal().await {
            shutdown.store(true, Ordering::Relaxed);
        }
    });
}

async fn ctrl_c() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, initiating shutdown...");
            true
        }
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            false
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => tokio::select! {
            received = ctrl_c() => received,
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown...");
                true
            }
        },
        Err(e) => {
            error!("Failed to listen for SIGTERM: {}", e);
            ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> bool {
    ctrl_c().await
}

#[cfg(test)]
mod tests {
    // Loop behaviour is covered with in-memory stores in tests/worker_loop.rs
}
