//! Task domain types
//!
//! A task row travels through the worker as [`Task`]; its `task_type` and
//! `task_data` are decoded into a typed [`TaskPayload`] only at dispatch time,
//! and handler output is encoded from a typed [`TaskResult`] only when the
//! task is completed.

pub mod payload;
pub mod progress;
pub mod result;
mod status;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

pub use payload::{
    EvaluationParams, FileRef, GenerationParams, InfobitExtractionParams,
    InfobitGenerationParams, Language, RequirementExtractionParams, TaskPayload,
};
pub use progress::ProgressReporter;
pub use result::{
    DocumentScore, EvaluationResult, GenerationResult, InfobitExtractionResult,
    InfobitGenerationResult, RequirementExtractionResult, TaskResult,
};
pub use status::{TaskStatus, TaskType};

/// Identity of a running worker process
///
/// Short random token, used to tag claimed tasks and prefix log lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(String);

impl WorkerId {
    /// Create a WorkerId from an existing string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh 8-character worker identity
    pub fn generate() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A task record as held by the task store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    /// Raw task type; unknown values are rejected at dispatch, not at load
    pub task_type: String,
    pub task_data: Value,
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub status: TaskStatus,
    pub progress: i32,
    pub progress_message: Option<String>,
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result_data: Option<Value>,
    pub error_message: Option<String>,
}

impl Task {
    /// Build a pending task from a submission
    pub fn from_new(new_task: NewTask) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: new_task.task_type,
            task_data: new_task.task_data,
            user_id: new_task.user_id,
            project_id: new_task.project_id,
            status: TaskStatus::Pending,
            progress: 0,
            progress_message: None,
            worker_id: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result_data: None,
            error_message: None,
        }
    }

    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// A processing task that started before `cutoff` is presumed orphaned
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Processing
            && self.started_at.map(|started| started < cutoff).unwrap_or(false)
    }
}

/// Fields supplied by whoever enqueues a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub task_type: String,
    pub task_data: Value,
}

impl NewTask {
    pub fn new(task_type: impl Into<String>, task_data: Value) -> Self {
        Self {
            user_id: None,
            project_id: None,
            task_type: task_type.into(),
            task_data,
        }
    }

    /// Builder method to set the submitting user
    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Builder method to set the related project
    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }
}
