//! Task status and task type enums

use crate::error::WorkerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Task lifecycle status
///
/// pending -> processing -> {completed | failed | cancelled}; recovery is the
/// only path from processing back to pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if the task can no longer change status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(WorkerError::Message(format!("Unknown task status: {}", other))),
        }
    }
}

/// The closed set of task types the worker knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    InfobitExtraction,
    InfobitGeneration,
    Evaluation,
    Generation,
    RequirementExtraction,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::InfobitExtraction,
        TaskType::InfobitGeneration,
        TaskType::Evaluation,
        TaskType::Generation,
        TaskType::RequirementExtraction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::InfobitExtraction => "infobit_extraction",
            TaskType::InfobitGeneration => "infobit_generation",
            TaskType::Evaluation => "evaluation",
            TaskType::Generation => "generation",
            TaskType::RequirementExtraction => "requirement_extraction",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| WorkerError::UnknownTaskType(s.to_string()))
    }
}
