//! Postgres-backed task store

use super::TaskStore;
use crate::db::{task_queue, DbPool};
use crate::error::Result;
use crate::task::{NewTask, Task, WorkerId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Task store over the `task_queue` table
#[derive(Clone)]
pub struct PgTaskStore {
    pool: DbPool,
}

impl PgTaskStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn create_task(&self, new_task: &NewTask) -> Result<Task> {
        task_queue::create_task(&self.pool, new_task).await
    }

    pub async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>> {
        task_queue::get_task(&self.pool, task_id).await
    }

    /// Cancel a pending task; returns false for any other status
    pub async fn cancel_task(&self, task_id: Uuid) -> Result<bool> {
        task_queue::cancel_task(&self.pool, task_id).await
    }

    pub async fn count_pending(&self) -> Result<i64> {
        task_queue::count_pending(&self.pool).await
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn claim_next_task(&self, worker_id: &WorkerId) -> Result<Option<Task>> {
        task_queue::claim_next_task(&self.pool, worker_id.as_str()).await
    }

    async fn update_progress(&self, task_id: Uuid, progress: u8, message: &str) -> Result<()> {
        task_queue::update_progress(&self.pool, task_id, i32::from(progress), message).await
    }

    async fn complete_task(&self, task_id: Uuid, result_data: Value) -> Result<()> {
        task_queue::complete_task(&self.pool, task_id, &result_data).await
    }

    async fn fail_task(&self, task_id: Uuid, error_message: &str) -> Result<()> {
        task_queue::fail_task(&self.pool, task_id, error_message).await
    }

    async fn list_stale_processing(&self, older_than: DateTime<Utc>) -> Result<Vec<Task>> {
        task_queue::list_stale_processing(&self.pool, older_than).await
    }

    async fn requeue(&self, task_id: Uuid) -> Result<bool> {
        task_queue::requeue(&self.pool, task_id).await
    }
}
