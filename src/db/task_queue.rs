//! Task queue database operations

use crate::db::models::TaskRow;
use crate::db::DbPool;
use crate::error::{Result, WorkerError};
use crate::queue::REQUEUE_MESSAGE;
use crate::task::{NewTask, Task};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

/// Atomically claim the next pending task and return it.
///
/// Safe for concurrent workers: `SKIP LOCKED` makes a competing claim move on
/// to the next row instead of waiting for (or re-taking) a locked one.
pub async fn claim_next_task(pool: &DbPool, worker_id: &str) -> Result<Option<Task>> {
    let row = sqlx::query_as::<_, TaskRow>(
        r#"
        WITH next_task AS (
            SELECT id FROM task_queue
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        UPDATE task_queue
        SET status = 'processing',
            worker_id = $1,
            started_at = NOW()
        WHERE id = (SELECT id FROM next_task)
        RETURNING *
        "#,
    )
    .bind(worker_id)
    .fetch_optional(pool)
    .await?;

    row.map(Task::try_from).transpose()
}

/// Update task progress
pub async fn update_progress(pool: &DbPool, task_id: Uuid, progress: i32, message: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE task_queue
        SET progress = $2,
            progress_message = $3
        WHERE id = $1
        "#,
    )
    .bind(task_id)
    .bind(progress)
    .bind(message)
    .execute(pool)
    .await?;

    ensure_found(result.rows_affected(), task_id)
}

/// Complete a task successfully
pub async fn complete_task(pool: &DbPool, task_id: Uuid, result_data: &Value) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE task_queue
        SET status = 'completed',
            progress = 100,
            result_data = $2,
            completed_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(task_id)
    .bind(result_data)
    .execute(pool)
    .await?;

    ensure_found(result.rows_affected(), task_id)
}

/// Mark a task as failed
pub async fn fail_task(pool: &DbPool, task_id: Uuid, error_message: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE task_queue
        SET status = 'failed',
            error_message = $2,
            completed_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(task_id)
    .bind(error_message)
    .execute(pool)
    .await?;

    ensure_found(result.rows_affected(), task_id)
}

/// List processing tasks started strictly before `older_than`
pub async fn list_stale_processing(pool: &DbPool, older_than: DateTime<Utc>) -> Result<Vec<Task>> {
    let rows = sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT * FROM task_queue
        WHERE status = 'processing'
          AND started_at < $1
        ORDER BY started_at ASC
        "#,
    )
    .bind(older_than)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Task::try_from).collect()
}

/// Put a processing task back to pending
///
/// Returns false when the task had already left the processing state.
pub async fn requeue(pool: &DbPool, task_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE task_queue
        SET status = 'pending',
            progress = 0,
            progress_message = $2,
            worker_id = NULL
        WHERE id = $1
          AND status = 'processing'
        "#,
    )
    .bind(task_id)
    .bind(REQUEUE_MESSAGE)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Create a new pending task
pub async fn create_task(pool: &DbPool, new_task: &NewTask) -> Result<Task> {
    let row = sqlx::query_as::<_, TaskRow>(
        r#"
        INSERT INTO task_queue (user_id, project_id, task_type, task_data)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(new_task.user_id)
    .bind(new_task.project_id)
    .bind(&new_task.task_type)
    .bind(&new_task.task_data)
    .fetch_one(pool)
    .await?;

    Task::try_from(row)
}

/// Get a task by ID
pub async fn get_task(pool: &DbPool, task_id: Uuid) -> Result<Option<Task>> {
    let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM task_queue WHERE id = $1")
        .bind(task_id)
        .fetch_optional(pool)
        .await?;

    row.map(Task::try_from).transpose()
}

/// Cancel a pending task
///
/// Returns false when the task was not pending.
pub async fn cancel_task(pool: &DbPool, task_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE task_queue
        SET status = 'cancelled',
            completed_at = NOW()
        WHERE id = $1
          AND status = 'pending'
        "#,
    )
    .bind(task_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Count pending tasks for monitoring
pub async fn count_pending(pool: &DbPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM task_queue WHERE status = 'pending'")
        .fetch_one(pool)
        .await?;

    Ok(row.get("count"))
}

fn ensure_found(rows_affected: u64, task_id: Uuid) -> Result<()> {
    if rows_affected == 0 {
        return Err(WorkerError::NotFound(format!("Task {}", task_id)));
    }
    Ok(())
}
