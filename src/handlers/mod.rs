//! Task handlers
//!
//! Each handler takes its typed payload, the task's ids and a progress
//! reporter, and returns its typed result. Failures of the blob store, the
//! parser or the language model on a single input item are logged and that
//! item is skipped; repository errors propagate and fail the task.

pub mod evaluation;
pub mod generation;
pub mod infobit_extraction;
pub mod infobit_generation;
pub mod requirement_extraction;

use crate::ai::LanguageModel;
use crate::db::models::{ChecklistEntry, GrantRequirement};
use crate::error::{Result, WorkerError};
use crate::office::DocumentParser;
use crate::repository::ProjectRepository;
use crate::storage::BlobStorage;
use crate::task::{ProgressReporter, Task, TaskPayload, TaskResult};
use std::sync::Arc;
use uuid::Uuid;

/// Collaborators shared by all handlers, built once at startup
#[derive(Clone)]
pub struct HandlerContext {
    pub repository: Arc<dyn ProjectRepository>,
    pub storage: Arc<dyn BlobStorage>,
    pub model: Arc<dyn LanguageModel>,
    pub parser: Arc<dyn DocumentParser>,
}

impl HandlerContext {
    pub fn new(
        repository: Arc<dyn ProjectRepository>,
        storage: Arc<dyn BlobStorage>,
        model: Arc<dyn LanguageModel>,
        parser: Arc<dyn DocumentParser>,
    ) -> Self {
        Self {
            repository,
            storage,
            model,
            parser,
        }
    }

    /// Download a file and extract its text
    pub async fn download_text(&self, bucket: &str, path: &str, file_name: &str) -> Result<String> {
        let data = self.storage.download(bucket, path).await?;
        self.parse(data, file_name).await
    }

    /// Extract text off the async runtime
    pub async fn parse(&self, data: Vec<u8>, file_name: &str) -> Result<String> {
        let parser = Arc::clone(&self.parser);
        let name = file_name.to_string();
        tokio::task::spawn_blocking(move || parser.parse(&data, &name))
            .await
            .map_err(|e| WorkerError::DocumentError(format!("Parser task failed: {}", e)))?
    }
}

/// Ids of the task being handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobContext {
    pub task_id: Uuid,
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

impl JobContext {
    pub fn from_task(task: &Task) -> Self {
        Self {
            task_id: task.id,
            user_id: task.user_id,
            project_id: task.project_id,
        }
    }

    /// The project id, for handlers that work on a project
    pub fn require_project(&self) -> Result<Uuid> {
        self.project_id
            .ok_or_else(|| WorkerError::Message("Task has no project_id".to_string()))
    }
}

/// Run the handler for `payload`
pub async fn handle(
    ctx: &HandlerContext,
    payload: TaskPayload,
    job: &JobContext,
    progress: &ProgressReporter,
) -> Result<TaskResult> {
    let result = match payload {
        TaskPayload::InfobitExtraction(params) => {
            infobit_extraction::run(ctx, params, job, progress).await?.into()
        }
        TaskPayload::InfobitGeneration(params) => {
            infobit_generation::run(ctx, params, job, progress).await?.into()
        }
        TaskPayload::Evaluation(params) => evaluation::run(ctx, params, job, progress).await?.into(),
        TaskPayload::Generation(params) => generation::run(ctx, params, job, progress).await?.into(),
        TaskPayload::RequirementExtraction(params) => {
            requirement_extraction::run(ctx, params, progress).await?.into()
        }
    };
    Ok(result)
}

/// Requirement names and descriptions as markdown sections
pub fn requirements_outline(requirements: &[GrantRequirement]) -> String {
    let mut text = String::new();
    for req in requirements {
        text.push_str(&format!("\n## {}\n", req.name));
        text.push_str(&format!("{}\n", req.description.as_deref().unwrap_or("")));
    }
    text
}

/// [`requirements_outline`] followed by each requirement's checklist items
pub fn requirements_with_checklists(requirements: &[GrantRequirement]) -> String {
    let mut text = String::new();
    for req in requirements {
        text.push_str(&requirements_outline(std::slice::from_ref(req)));
        for entry in req.checklist() {
            text.push_str(&checklist_line(&entry));
        }
    }
    text
}

fn checklist_line(entry: &ChecklistEntry) -> String {
    match entry {
        ChecklistEntry::Item {
            name, description, ..
        } => format!("- {}: {}\n", name, description),
        ChecklistEntry::Text(text) => format!("- {}\n", text),
    }
}
