//! Postgres implementation of the project repository

use crate::ai::schema::{DocumentEvaluation, InfobitDefinition, RequirementItem};
use crate::db::models::{
    GrantExample, GrantRequirement, ProjectContext, ProjectDocument, ProjectInfobit,
    ProjectSection, ProjectUpdate,
};
use crate::db::{documents, grants, infobits, projects, sections, DbPool};
use crate::error::Result;
use crate::repository::ProjectRepository;
use async_trait::async_trait;
use uuid::Uuid;

/// Project repository over the application database
#[derive(Clone)]
pub struct PgProjectRepository {
    pool: DbPool,
}

impl PgProjectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    async fn project_context(&self, project_id: Uuid) -> Result<Option<ProjectContext>> {
        let project = match projects::get_project(&self.pool, project_id).await? {
            Some(project) => project,
            None => return Ok(None),
        };

        let (grant, requirements) = match project.grant_id {
            Some(grant_id) => (
                grants::get_grant(&self.pool, grant_id).await?,
                grants::grant_requirements(&self.pool, grant_id).await?,
            ),
            None => (None, Vec::new()),
        };
        let documents = documents::project_documents(&self.pool, project_id).await?;

        Ok(Some(ProjectContext {
            project,
            grant,
            requirements,
            documents,
        }))
    }

    async fn update_project(&self, project_id: Uuid, update: &ProjectUpdate) -> Result<()> {
        projects::update_project(&self.pool, project_id, update).await
    }

    async fn project_documents(&self, project_id: Uuid) -> Result<Vec<ProjectDocument>> {
        documents::project_documents(&self.pool, project_id).await
    }

    async fn store_document_text(&self, document_id: Uuid, text: &str) -> Result<()> {
        documents::update_extracted_text(&self.pool, document_id, text).await
    }

    async fn store_document_evaluation(
        &self,
        document_id: Uuid,
        evaluation: &DocumentEvaluation,
    ) -> Result<()> {
        documents::store_evaluation(&self.pool, document_id, evaluation).await
    }

    async fn empty_infobits(&self, project_id: Uuid) -> Result<Vec<ProjectInfobit>> {
        infobits::empty_infobits(&self.pool, project_id).await
    }

    async fn fill_infobit(
        &self,
        infobit_id: Uuid,
        value: &str,
        source: &str,
        confidence: Option<f64>,
    ) -> Result<()> {
        infobits::fill_infobit(&self.pool, infobit_id, value, source, confidence).await
    }

    async fn create_infobits(
        &self,
        project_id: Uuid,
        definitions: &[InfobitDefinition],
    ) -> Result<usize> {
        infobits::create_infobits(&self.pool, project_id, definitions).await
    }

    async fn project_infobits(&self, project_id: Uuid) -> Result<Vec<ProjectInfobit>> {
        infobits::project_infobits(&self.pool, project_id).await
    }

    async fn grant_requirements(&self, grant_id: Uuid) -> Result<Vec<GrantRequirement>> {
        grants::grant_requirements(&self.pool, grant_id).await
    }

    async fn grant_examples(&self, grant_id: Uuid) -> Result<Vec<GrantExample>> {
        grants::grant_examples(&self.pool, grant_id).await
    }

    async fn requirements_by_ids(&self, ids: &[Uuid]) -> Result<Vec<GrantRequirement>> {
        grants::requirements_by_ids(&self.pool, ids).await
    }

    async fn unprocessed_requirements(&self) -> Result<Vec<GrantRequirement>> {
        grants::unprocessed_requirements(&self.pool).await
    }

    async fn store_requirement_checklist(
        &self,
        requirement_id: Uuid,
        checklist: &[RequirementItem],
    ) -> Result<()> {
        let value = serde_json::to_value(checklist)?;
        grants::store_checklist(&self.pool, requirement_id, &value).await
    }

    async fn project_sections(&self, project_id: Uuid) -> Result<Vec<ProjectSection>> {
        sections::project_sections(&self.pool, project_id).await
    }

    async fn create_project_result(
        &self,
        project_id: Uuid,
        result_type: &str,
        file_path: &str,
    ) -> Result<()> {
        projects::create_project_result(&self.pool, project_id, result_type, file_path).await
    }
}
