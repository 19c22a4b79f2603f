//! Task store abstraction
//!
//! The worker loop only ever talks to a [`TaskStore`]. The Postgres store is
//! what runs in production; the in-memory store backs tests and local runs.

mod memory;
mod postgres;

use crate::error::Result;
use crate::task::{Task, WorkerId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

pub use memory::InMemoryTaskStore;
pub use postgres::PgTaskStore;

/// Progress message written when recovery puts an orphaned task back
pub const REQUEUE_MESSAGE: &str = "Requeued after worker restart";

/// Durable queue of task records
///
/// `claim_next_task` must be atomic: concurrent callers never receive the
/// same task.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Claim the oldest pending task for `worker_id`
    ///
    /// Sets status to processing, records the worker and `started_at`.
    async fn claim_next_task(&self, worker_id: &WorkerId) -> Result<Option<Task>>;

    /// Record handler progress
    async fn update_progress(&self, task_id: Uuid, progress: u8, message: &str) -> Result<()>;

    /// Mark a task completed with its result; progress becomes 100
    async fn complete_task(&self, task_id: Uuid, result_data: Value) -> Result<()>;

    /// Mark a task failed with an error message
    async fn fail_task(&self, task_id: Uuid, error_message: &str) -> Result<()>;

    /// Processing tasks whose `started_at` is strictly before `older_than`
    async fn list_stale_processing(&self, older_than: DateTime<Utc>) -> Result<Vec<Task>>;

    /// Return a processing task to pending
    ///
    /// Clears the worker, resets progress to 0 and writes [`REQUEUE_MESSAGE`].
    /// Returns false when the task was no longer processing.
    async fn requeue(&self, task_id: Uuid) -> Result<bool>;
}
