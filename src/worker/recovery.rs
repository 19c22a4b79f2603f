//! Startup sweep for tasks orphaned by a dead worker

use crate::queue::TaskStore;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Requeue processing tasks started more than `stale_after` ago
///
/// Returns how many tasks went back to pending. Errors are logged, never
/// returned, so a failed sweep does not keep the worker from starting.
pub async fn recover_stale_tasks(store: &dyn TaskStore, stale_after: Duration) -> usize {
    let cutoff = chrono::Duration::from_std(stale_after)
        .ok()
        .and_then(|age| Utc::now().checked_sub_signed(age));

    match cutoff {
        Some(cutoff) => recover_stale_tasks_before(store, cutoff).await,
        None => {
            warn!("Stale threshold {:?} is out of range, skipping recovery", stale_after);
            0
        }
    }
}

/// Requeue processing tasks whose `started_at` is before `cutoff`
pub async fn recover_stale_tasks_before(store: &dyn TaskStore, cutoff: DateTime<Utc>) -> usize {
    let stale = match store.list_stale_processing(cutoff).await {
        Ok(stale) => stale,
        Err(e) => {
            error!("Error listing stale tasks: {}", e);
            return 0;
        }
    };

    if stale.is_empty() {
        debug!("No stale tasks found");
        return 0;
    }

    let mut requeued = 0;
    for task in stale {
        match store.requeue(task.id).await {
            Ok(true) => {
                info!(
                    "Requeued stale task {} ({}) from worker {}",
                    task.id,
                    task.task_type,
                    task.worker_id.as_deref().unwrap_or("unknown")
                );
                requeued += 1;
            }
            Ok(false) => debug!("Task {} left processing before it could be requeued", task.id),
            Err(e) => warn!("Error requeueing task {}: {}", task.id, e),
        }
    }

    info!("Recovered {} stale task(s)", requeued);
    requeued
}
