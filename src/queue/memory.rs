//! In-memory task store

use super::{TaskStore, REQUEUE_MESSAGE};
use crate::error::{Result, WorkerError};
use crate::task::{NewTask, Task, TaskStatus, WorkerId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Task store held in process memory
///
/// A single mutex around the task list makes claims atomic.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Task>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a fully formed task record
    pub fn insert(&self, task: Task) {
        self.lock().push(task);
    }

    /// Enqueue a new pending task
    pub fn create_task(&self, new_task: NewTask) -> Task {
        let task = Task::from_new(new_task);
        self.insert(task.clone());
        task
    }

    pub fn get_task(&self, task_id: Uuid) -> Option<Task> {
        self.lock().iter().find(|t| t.id == task_id).cloned()
    }

    /// Cancel a pending task; returns false for any other status
    pub fn cancel_task(&self, task_id: Uuid) -> Result<bool> {
        self.update(task_id, |task| {
            if task.status != TaskStatus::Pending {
                return false;
            }
            task.status = TaskStatus::Cancelled;
            task.completed_at = Some(Utc::now());
            true
        })
    }

    pub fn count_pending(&self) -> usize {
        self.lock()
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .count()
    }

    /// Snapshot of every task, in insertion order
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().clone()
    }

    /// Apply `f` to the task with `task_id`
    pub fn update<T>(&self, task_id: Uuid, f: impl FnOnce(&mut Task) -> T) -> Result<T> {
        let mut tasks = self.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| WorkerError::NotFound(format!("Task {}", task_id)))?;
        Ok(f(task))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn claim_next_task(&self, worker_id: &WorkerId) -> Result<Option<Task>> {
        let mut tasks = self.lock();
        let next = tasks
            .iter_mut()
            .filter(|t| t.status == TaskStatus::Pending)
            .min_by_key(|t| t.created_at);

        Ok(next.map(|task| {
            task.status = TaskStatus::Processing;
            task.worker_id = Some(worker_id.to_string());
            task.started_at = Some(Utc::now());
            task.clone()
        }))
    }

    async fn update_progress(&self, task_id: Uuid, progress: u8, message: &str) -> Result<()> {
        self.update(task_id, |task| {
            task.progress = i32::from(progress);
            task.progress_message = Some(message.to_string());
        })
    }

    async fn complete_task(&self, task_id: Uuid, result_data: Value) -> Result<()> {
        self.update(task_id, |task| {
            task.status = TaskStatus::Completed;
            task.progress = 100;
            task.result_data = Some(result_data);
            task.completed_at = Some(Utc::now());
        })
    }

    async fn fail_task(&self, task_id: Uuid, error_message: &str) -> Result<()> {
        self.update(task_id, |task| {
            task.status = TaskStatus::Failed;
            task.error_message = Some(error_message.to_string());
            task.completed_at = Some(Utc::now());
        })
    }

    async fn list_stale_processing(&self, older_than: DateTime<Utc>) -> Result<Vec<Task>> {
        Ok(self
            .lock()
            .iter()
            .filter(|t| t.is_stale(older_than))
            .cloned()
            .collect())
    }

    async fn requeue(&self, task_id: Uuid) -> Result<bool> {
        self.update(task_id, |task| {
            if task.status != TaskStatus::Processing {
                return false;
            }
            task.status = TaskStatus::Pending;
            task.progress = 0;
            task.progress_message = Some(REQUEUE_MESSAGE.to_string());
            task.worker_id = None;
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn new_task(kind: &str) -> NewTask {
        NewTask::new(kind, json!({}))
    }

    #[tokio::test]
    async fn test_claims_oldest_pending_first() {
        let store = InMemoryTaskStore::new();
        let first = store.create_task(new_task("evaluation"));
        let second = store.create_task(new_task("generation"));
        store
            .update(second.id, |t| t.created_at = first.created_at - Duration::seconds(5))
            .unwrap();

        let worker = WorkerId::from("w1");
        let claimed = store.claim_next_task(&worker).await.unwrap().unwrap();
        assert_eq!(claimed.id, second.id);
        assert_eq!(claimed.status, TaskStatus::Processing);
        assert_eq!(claimed.worker_id.as_deref(), Some("w1"));
        assert!(claimed.started_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_share_a_task() {
        let store = Arc::new(InMemoryTaskStore::new());
        for _ in 0..5 {
            store.create_task(new_task("evaluation"));
        }

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .claim_next_task(&WorkerId::new(format!("w{}", i)))
                    .await
                    .unwrap()
            }));
        }

        let mut claimed = Vec::new();
        for handle in handles {
            if let Some(task) = handle.await.unwrap() {
                claimed.push(task.id);
            }
        }

        let unique: HashSet<_> = claimed.iter().collect();
        assert_eq!(claimed.len(), 5);
        assert_eq!(unique.len(), 5);
        assert_eq!(store.count_pending(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_task_is_never_claimed() {
        let store = InMemoryTaskStore::new();
        let task = store.create_task(new_task("evaluation"));

        assert!(store.cancel_task(task.id).unwrap());
        let cancelled = store.get_task(task.id).unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());

        let claimed = store.claim_next_task(&WorkerId::from("w1")).await.unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn test_cancel_leaves_processing_task_alone() {
        let store = InMemoryTaskStore::new();
        let task = store.create_task(new_task("evaluation"));
        store.claim_next_task(&WorkerId::from("w1")).await.unwrap();

        assert!(!store.cancel_task(task.id).unwrap());
        assert_eq!(store.get_task(task.id).unwrap().status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn test_requeue_only_touches_processing_tasks() {
        let store = InMemoryTaskStore::new();
        let task = store.create_task(new_task("evaluation"));
        assert!(!tokio_test::assert_ok!(store.requeue(task.id).await));

        store.claim_next_task(&WorkerId::from("w1")).await.unwrap();
        store.update_progress(task.id, 40, "halfway").await.unwrap();
        assert!(store.requeue(task.id).await.unwrap());

        let requeued = store.get_task(task.id).unwrap();
        assert_eq!(requeued.status, TaskStatus::Pending);
        assert_eq!(requeued.progress, 0);
        assert_eq!(requeued.worker_id, None);
        assert_eq!(requeued.progress_message.as_deref(), Some(REQUEUE_MESSAGE));
    }

    #[tokio::test]
    async fn test_missing_task_is_not_found() {
        let store = InMemoryTaskStore::new();
        let err = store.fail_task(Uuid::new_v4(), "boom").await.unwrap_err();
        assert!(matches!(err, WorkerError::NotFound(_)));
    }
}
