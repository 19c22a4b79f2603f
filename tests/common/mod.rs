//! In-memory collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grant_worker::ai::schema::{DocumentEvaluation, InfobitDefinition, RequirementItem};
use grant_worker::ai::{GenerationOptions, LanguageModel, StructuredSchema};
use grant_worker::db::models::{
    Grant, GrantExample, GrantRequirement, Project, ProjectContext, ProjectDocument,
    ProjectInfobit, ProjectSection, ProjectUpdate,
};
use grant_worker::office::BuiltinParser;
use grant_worker::repository::ProjectRepository;
use grant_worker::storage::BlobStorage;
use grant_worker::{HandlerContext, Result, Task, TaskStore, WorkerError, WorkerId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Repository
// ============================================================================

/// Everything the fake repository holds or has been asked to write
#[derive(Default)]
pub struct RepoState {
    pub projects: Vec<Project>,
    pub grants: Vec<Grant>,
    pub requirements: Vec<GrantRequirement>,
    pub examples: Vec<GrantExample>,
    pub documents: Vec<ProjectDocument>,
    pub infobits: Vec<ProjectInfobit>,
    pub sections: Vec<ProjectSection>,
    pub project_updates: Vec<(Uuid, ProjectUpdate)>,
    pub evaluations: Vec<(Uuid, DocumentEvaluation)>,
    pub checklists: Vec<(Uuid, Vec<RequirementItem>)>,
    pub results: Vec<(Uuid, String, String)>,
    /// When set, `project_context` fails with this message
    pub project_error: Option<String>,
    /// When set, `project_context` panics
    pub panic_on_project: bool,
    /// When set, `project_context` sleeps this long first
    pub project_delay: Option<Duration>,
}

#[derive(Default)]
pub struct FakeRepository {
    pub state: Mutex<RepoState>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(&self, f: impl FnOnce(&mut RepoState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn read<T>(&self, f: impl FnOnce(&RepoState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    /// Add a project (with an optional grant) and return its id
    pub fn add_project(&self, name: &str, grant_id: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        self.with(|s| {
            s.projects.push(Project {
                id,
                user_id: None,
                grant_id,
                name: name.to_string(),
                description: Some("A test project".to_string()),
                status: Some("draft".to_string()),
                overall_score: None,
                infobits_completion: None,
                infobits_generated: None,
                created_at: Utc::now(),
            })
        });
        id
    }

    pub fn add_document(&self, project_id: Uuid, name: &str, text: Option<&str>, file_path: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.with(|s| {
            s.documents.push(ProjectDocument {
                id,
                project_id,
                name: name.to_string(),
                file_path: file_path.map(str::to_string),
                extracted_text: text.map(str::to_string),
                document_score: None,
                created_at: Utc::now(),
            })
        });
        id
    }

    pub fn add_infobit(&self, project_id: Uuid, field_name: &str, required: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.with(|s| {
            s.infobits.push(ProjectInfobit {
                id,
                project_id,
                field_name: field_name.to_string(),
                field_label: field_name.to_string(),
                field_label_en: None,
                field_description: None,
                category: "general".to_string(),
                is_required: required,
                value: None,
                source: None,
                confidence: None,
                sort_order: 0,
            })
        });
        id
    }

    pub fn add_requirement(&self, grant_id: Uuid, name: &str, file_path: Option<&str>, checklist: Option<Value>) -> Uuid {
        let id = Uuid::new_v4();
        self.with(|s| {
            s.requirements.push(GrantRequirement {
                id,
                grant_id,
                name: name.to_string(),
                description: None,
                file_path: file_path.map(str::to_string),
                extracted_checklist: checklist,
                sort_order: None,
            })
        });
        id
    }
}

#[async_trait]
impl ProjectRepository for FakeRepository {
    async fn project_context(&self, project_id: Uuid) -> Result<Option<ProjectContext>> {
        if let Some(delay) = self.read(|s| s.project_delay) {
            tokio::time::sleep(delay).await;
        }

        let s = self.state.lock().unwrap();
        if s.panic_on_project {
            drop(s);
            panic!("project lookup exploded");
        }
        if let Some(message) = &s.project_error {
            return Err(WorkerError::Message(message.clone()));
        }

        let Some(project) = s.projects.iter().find(|p| p.id == project_id).cloned() else {
            return Ok(None);
        };
        let grant = project
            .grant_id
            .and_then(|gid| s.grants.iter().find(|g| g.id == gid).cloned());
        let requirements = project
            .grant_id
            .map(|gid| s.requirements.iter().filter(|r| r.grant_id == gid).cloned().collect())
            .unwrap_or_default();
        let documents = s
            .documents
            .iter()
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect();

        Ok(Some(ProjectContext {
            project,
            grant,
            requirements,
            documents,
        }))
    }

    async fn update_project(&self, project_id: Uuid, update: &ProjectUpdate) -> Result<()> {
        self.with(|s| s.project_updates.push((project_id, update.clone())));
        Ok(())
    }

    async fn project_documents(&self, project_id: Uuid) -> Result<Vec<ProjectDocument>> {
        Ok(self.read(|s| {
            s.documents
                .iter()
                .filter(|d| d.project_id == project_id)
                .cloned()
                .collect()
        }))
    }

    async fn store_document_text(&self, document_id: Uuid, text: &str) -> Result<()> {
        self.with(|s| {
            if let Some(doc) = s.documents.iter_mut().find(|d| d.id == document_id) {
                doc.extracted_text = Some(text.to_string());
            }
        });
        Ok(())
    }

    async fn store_document_evaluation(&self, document_id: Uuid, evaluation: &DocumentEvaluation) -> Result<()> {
        self.with(|s| s.evaluations.push((document_id, evaluation.clone())));
        Ok(())
    }

    async fn empty_infobits(&self, project_id: Uuid) -> Result<Vec<ProjectInfobit>> {
        Ok(self.read(|s| {
            s.infobits
                .iter()
                .filter(|ib| ib.project_id == project_id && !ib.is_filled())
                .cloned()
                .collect()
        }))
    }

    async fn fill_infobit(&self, infobit_id: Uuid, value: &str, source: &str, confidence: Option<f64>) -> Result<()> {
        self.with(|s| {
            if let Some(ib) = s.infobits.iter_mut().find(|ib| ib.id == infobit_id) {
                ib.value = Some(value.to_string());
                ib.source = Some(source.to_string());
                ib.confidence = confidence;
            }
        });
        Ok(())
    }

    async fn create_infobits(&self, project_id: Uuid, infobits: &[InfobitDefinition]) -> Result<usize> {
        self.with(|s| {
            for def in infobits {
                s.infobits.push(ProjectInfobit {
                    id: Uuid::new_v4(),
                    project_id,
                    field_name: def.field_name.clone(),
                    field_label: def.field_label.clone(),
                    field_label_en: Some(def.field_label_en.clone()),
                    field_description: Some(def.field_description.clone()),
                    category: def.category.clone(),
                    is_required: def.is_required,
                    value: None,
                    source: None,
                    confidence: None,
                    sort_order: def.sort_order,
                });
            }
        });
        Ok(infobits.len())
    }

    async fn project_infobits(&self, project_id: Uuid) -> Result<Vec<ProjectInfobit>> {
        Ok(self.read(|s| {
            s.infobits
                .iter()
                .filter(|ib| ib.project_id == project_id)
                .cloned()
                .collect()
        }))
    }

    async fn grant_requirements(&self, grant_id: Uuid) -> Result<Vec<GrantRequirement>> {
        Ok(self.read(|s| {
            s.requirements
                .iter()
                .filter(|r| r.grant_id == grant_id)
                .cloned()
                .collect()
        }))
    }

    async fn grant_examples(&self, grant_id: Uuid) -> Result<Vec<GrantExample>> {
        Ok(self.read(|s| {
            s.examples
                .iter()
                .filter(|e| e.grant_id == grant_id)
                .cloned()
                .collect()
        }))
    }

    async fn requirements_by_ids(&self, ids: &[Uuid]) -> Result<Vec<GrantRequirement>> {
        Ok(self.read(|s| {
            ids.iter()
                .filter_map(|id| s.requirements.iter().find(|r| r.id == *id).cloned())
                .collect()
        }))
    }

    async fn unprocessed_requirements(&self) -> Result<Vec<GrantRequirement>> {
        Ok(self.read(|s| {
            s.requirements
                .iter()
                .filter(|r| r.extracted_checklist.is_none())
                .cloned()
                .collect()
        }))
    }

    async fn store_requirement_checklist(&self, requirement_id: Uuid, checklist: &[RequirementItem]) -> Result<()> {
        self.with(|s| {
            s.checklists.push((requirement_id, checklist.to_vec()));
            if let Some(req) = s.requirements.iter_mut().find(|r| r.id == requirement_id) {
                req.extracted_checklist = Some(serde_json::to_value(checklist).unwrap());
            }
        });
        Ok(())
    }

    async fn project_sections(&self, project_id: Uuid) -> Result<Vec<ProjectSection>> {
        Ok(self.read(|s| {
            s.sections
                .iter()
                .filter(|sec| sec.project_id == project_id)
                .cloned()
                .collect()
        }))
    }

    async fn create_project_result(&self, project_id: Uuid, result_type: &str, file_path: &str) -> Result<()> {
        self.with(|s| {
            s.results
                .push((project_id, result_type.to_string(), file_path.to_string()))
        });
        Ok(())
    }
}

// ============================================================================
// Blob storage
// ============================================================================

/// Bucket/path keyed byte store
#[derive(Default)]
pub struct FakeStorage {
    pub objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    pub uploads: Mutex<Vec<(String, String, String)>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, path: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), path.to_string()), data.to_vec());
    }

    pub fn get(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    /// (bucket, path, content type) of every upload, in order
    pub fn uploads(&self) -> Vec<(String, String, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStorage for FakeStorage {
    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        self.get(bucket, path)
            .ok_or_else(|| WorkerError::StorageError(format!("{}/{} does not exist", bucket, path)))
    }

    async fn upload(&self, bucket: &str, path: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        self.put(bucket, path, &data);
        self.uploads.lock().unwrap().push((
            bucket.to_string(),
            path.to_string(),
            content_type.to_string(),
        ));
        Ok(())
    }
}

// ============================================================================
// Language model
// ============================================================================

/// Canned answers: JSON by schema name, one fixed text answer
///
/// A schema without a canned answer, or text when none is set, is a model
/// error.
#[derive(Default)]
pub struct FakeModel {
    pub json: Mutex<HashMap<String, Value>>,
    pub text: Mutex<Option<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_json(&self, schema: &str, value: Value) {
        self.json.lock().unwrap().insert(schema.to_string(), value);
    }

    pub fn answer_text(&self, text: &str) {
        *self.text.lock().unwrap() = Some(text.to_string());
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn generate_text(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.text
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| WorkerError::ModelError("no text answer configured".to_string()))
    }

    async fn generate_json(&self, prompt: &str, schema: &StructuredSchema, _options: &GenerationOptions) -> Result<Value> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.json
            .lock()
            .unwrap()
            .get(&schema.name)
            .cloned()
            .ok_or_else(|| WorkerError::ModelError(format!("no answer for {}", schema.name)))
    }
}

// ============================================================================
// Task stores
// ============================================================================

/// Task store whose every call fails
pub struct FailingStore;

#[async_trait]
impl TaskStore for FailingStore {
    async fn claim_next_task(&self, _worker_id: &WorkerId) -> Result<Option<Task>> {
        Err(WorkerError::Message("connection reset".to_string()))
    }

    async fn update_progress(&self, _task_id: Uuid, _progress: u8, _message: &str) -> Result<()> {
        Err(WorkerError::Message("connection reset".to_string()))
    }

    async fn complete_task(&self, _task_id: Uuid, _result_data: Value) -> Result<()> {
        Err(WorkerError::Message("connection reset".to_string()))
    }

    async fn fail_task(&self, _task_id: Uuid, _error_message: &str) -> Result<()> {
        Err(WorkerError::Message("connection reset".to_string()))
    }

    async fn list_stale_processing(&self, _older_than: DateTime<Utc>) -> Result<Vec<Task>> {
        Err(WorkerError::Message("connection reset".to_string()))
    }

    async fn requeue(&self, _task_id: Uuid) -> Result<bool> {
        Err(WorkerError::Message("connection reset".to_string()))
    }
}

/// Wraps a store and records every progress report and terminal write
pub struct RecordingStore<S> {
    pub inner: S,
    pub progress: Mutex<Vec<(Uuid, u8, String)>>,
    pub terminal: Mutex<Vec<(Uuid, &'static str)>>,
}

impl<S> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            progress: Mutex::new(Vec::new()),
            terminal: Mutex::new(Vec::new()),
        }
    }

    pub fn progress_of(&self, task_id: Uuid) -> Vec<u8> {
        self.progress
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| *id == task_id)
            .map(|(_, p, _)| *p)
            .collect()
    }

    pub fn terminal_writes(&self, task_id: Uuid) -> Vec<&'static str> {
        self.terminal
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == task_id)
            .map(|(_, kind)| *kind)
            .collect()
    }
}

#[async_trait]
impl<S: TaskStore> TaskStore for RecordingStore<S> {
    async fn claim_next_task(&self, worker_id: &WorkerId) -> Result<Option<Task>> {
        self.inner.claim_next_task(worker_id).await
    }

    async fn update_progress(&self, task_id: Uuid, progress: u8, message: &str) -> Result<()> {
        self.progress
            .lock()
            .unwrap()
            .push((task_id, progress, message.to_string()));
        self.inner.update_progress(task_id, progress, message).await
    }

    async fn complete_task(&self, task_id: Uuid, result_data: Value) -> Result<()> {
        self.terminal.lock().unwrap().push((task_id, "complete"));
        self.inner.complete_task(task_id, result_data).await
    }

    async fn fail_task(&self, task_id: Uuid, error_message: &str) -> Result<()> {
        self.terminal.lock().unwrap().push((task_id, "fail"));
        self.inner.fail_task(task_id, error_message).await
    }

    async fn list_stale_processing(&self, older_than: DateTime<Utc>) -> Result<Vec<Task>> {
        self.inner.list_stale_processing(older_than).await
    }

    async fn requeue(&self, task_id: Uuid) -> Result<bool> {
        self.inner.requeue(task_id).await
    }
}

/// Wraps a store and fails chosen calls, delegating the rest
pub struct FlakyStore<S> {
    pub inner: S,
    /// Every progress update fails
    pub progress_down: bool,
    /// Requeueing this task fails
    pub requeue_fails_for: Option<Uuid>,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            progress_down: false,
            requeue_fails_for: None,
        }
    }
}

#[async_trait]
impl<S: TaskStore> TaskStore for FlakyStore<S> {
    async fn claim_next_task(&self, worker_id: &WorkerId) -> Result<Option<Task>> {
        self.inner.claim_next_task(worker_id).await
    }

    async fn update_progress(&self, task_id: Uuid, progress: u8, message: &str) -> Result<()> {
        if self.progress_down {
            return Err(WorkerError::Message("connection reset".to_string()));
        }
        self.inner.update_progress(task_id, progress, message).await
    }

    async fn complete_task(&self, task_id: Uuid, result_data: Value) -> Result<()> {
        self.inner.complete_task(task_id, result_data).await
    }

    async fn fail_task(&self, task_id: Uuid, error_message: &str) -> Result<()> {
        self.inner.fail_task(task_id, error_message).await
    }

    async fn list_stale_processing(&self, older_than: DateTime<Utc>) -> Result<Vec<Task>> {
        self.inner.list_stale_processing(older_than).await
    }

    async fn requeue(&self, task_id: Uuid) -> Result<bool> {
        if self.requeue_fails_for == Some(task_id) {
            return Err(WorkerError::Message("deadlock detected".to_string()));
        }
        self.inner.requeue(task_id).await
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Fakes plus the handler context built from them
pub struct Harness {
    pub repository: Arc<FakeRepository>,
    pub storage: Arc<FakeStorage>,
    pub model: Arc<FakeModel>,
    pub context: Arc<HandlerContext>,
}

impl Harness {
    pub fn new() -> Self {
        let repository = Arc::new(FakeRepository::new());
        let storage = Arc::new(FakeStorage::new());
        let model = Arc::new(FakeModel::new());
        let context = Arc::new(HandlerContext::new(
            repository.clone(),
            storage.clone(),
            model.clone(),
            Arc::new(BuiltinParser),
        ));
        Self {
            repository,
            storage,
            model,
            context,
        }
    }
}
