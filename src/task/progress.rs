//! Progress reporting for running tasks

use crate::queue::TaskStore;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Forwards (percentage, message) pairs for one task to the task store
///
/// Reporting is best-effort: a failed write is logged and otherwise ignored,
/// so it can never turn a successful task into a failed one.
#[derive(Clone)]
pub struct ProgressReporter {
    store: Arc<dyn TaskStore>,
    task_id: Uuid,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn TaskStore>, task_id: Uuid) -> Self {
        Self { store, task_id }
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Report progress; values above 100 are clamped
    pub async fn report(&self, progress: u8, message: impl Into<String>) {
        let progress = progress.min(100);
        let message = message.into();
        debug!("Task {} progress {}%: {}", self.task_id, progress, message);

        if let Err(e) = self
            .store
            .update_progress(self.task_id, progress, &message)
            .await
        {
            warn!("Error updating progress for task {}: {}", self.task_id, e);
        }
    }
}

/// Progress for item `index` of `total`, spread over `0..span` percent
pub fn scaled(index: usize, total: usize, span: u8) -> u8 {
    if total == 0 {
        return 0;
    }
    ((index * span as usize) / total).min(span as usize) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_progress() {
        assert_eq!(scaled(0, 4, 90), 0);
        assert_eq!(scaled(1, 4, 90), 22);
        assert_eq!(scaled(3, 4, 90), 67);
        assert_eq!(scaled(0, 0, 90), 0);
    }
}
