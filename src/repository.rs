//! Project data access used by the task handlers

use crate::ai::schema::{DocumentEvaluation, InfobitDefinition, RequirementItem};
use crate::db::models::{
    GrantExample, GrantRequirement, ProjectContext, ProjectDocument, ProjectInfobit,
    ProjectSection, ProjectUpdate,
};
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Relational store holding projects, grants, documents and infobits
///
/// Every failure here is a database failure and fails the running task.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// The project with its grant, grant requirements and documents
    async fn project_context(&self, project_id: Uuid) -> Result<Option<ProjectContext>>;

    async fn update_project(&self, project_id: Uuid, update: &ProjectUpdate) -> Result<()>;

    /// Documents of a project, newest first
    async fn project_documents(&self, project_id: Uuid) -> Result<Vec<ProjectDocument>>;

    async fn store_document_text(&self, document_id: Uuid, text: &str) -> Result<()>;

    async fn store_document_evaluation(
        &self,
        document_id: Uuid,
        evaluation: &DocumentEvaluation,
    ) -> Result<()>;

    /// Infobits without a value, ordered by category then sort order
    async fn empty_infobits(&self, project_id: Uuid) -> Result<Vec<ProjectInfobit>>;

    async fn fill_infobit(
        &self,
        infobit_id: Uuid,
        value: &str,
        source: &str,
        confidence: Option<f64>,
    ) -> Result<()>;

    /// Insert infobit fields for a project; returns how many were created
    async fn create_infobits(
        &self,
        project_id: Uuid,
        infobits: &[InfobitDefinition],
    ) -> Result<usize>;

    async fn project_infobits(&self, project_id: Uuid) -> Result<Vec<ProjectInfobit>>;

    async fn grant_requirements(&self, grant_id: Uuid) -> Result<Vec<GrantRequirement>>;

    async fn grant_examples(&self, grant_id: Uuid) -> Result<Vec<GrantExample>>;

    /// Requirements with the given ids; unknown ids are skipped
    async fn requirements_by_ids(&self, ids: &[Uuid]) -> Result<Vec<GrantRequirement>>;

    /// Requirements that have no extracted checklist yet
    async fn unprocessed_requirements(&self) -> Result<Vec<GrantRequirement>>;

    async fn store_requirement_checklist(
        &self,
        requirement_id: Uuid,
        checklist: &[RequirementItem],
    ) -> Result<()>;

    /// Sections of a project, in sort order
    async fn project_sections(&self, project_id: Uuid) -> Result<Vec<ProjectSection>>;

    /// Record a generated file against the project
    async fn create_project_result(
        &self,
        project_id: Uuid,
        result_type: &str,
        file_path: &str,
    ) -> Result<()>;
}

/// Percentage of required infobits that have a value
///
/// 0 without any infobits, 100 when none of them is required.
pub fn infobit_completion(infobits: &[ProjectInfobit]) -> i32 {
    if infobits.is_empty() {
        return 0;
    }

    let required: Vec<_> = infobits.iter().filter(|ib| ib.is_required).collect();
    if required.is_empty() {
        return 100;
    }

    let filled = required.iter().filter(|ib| ib.is_filled()).count();
    (filled * 100 / required.len()) as i32
}
