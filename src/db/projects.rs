//! Project database operations

use crate::db::models::{Project, ProjectUpdate};
use crate::db::DbPool;
use crate::error::Result;
use uuid::Uuid;

/// Get a project by ID
pub async fn get_project(pool: &DbPool, project_id: Uuid) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        SELECT id, user_id, grant_id, name, description, status,
               overall_score, infobits_completion, infobits_generated, created_at
        FROM projects
        WHERE id = $1
        "#,
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?;

    Ok(project)
}

/// Apply a partial update; fields left as `None` keep their current value
pub async fn update_project(pool: &DbPool, project_id: Uuid, update: &ProjectUpdate) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE projects
        SET overall_score = COALESCE($2, overall_score),
            infobits_completion = COALESCE($3, infobits_completion),
            infobits_generated = COALESCE($4, infobits_generated),
            status = COALESCE($5, status),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(project_id)
    .bind(update.overall_score)
    .bind(update.infobits_completion)
    .bind(update.infobits_generated)
    .bind(update.status.as_deref())
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a generated file for a project
pub async fn create_project_result(
    pool: &DbPool,
    project_id: Uuid,
    result_type: &str,
    file_path: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO project_results (project_id, result_type, file_path)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(project_id)
    .bind(result_type)
    .bind(file_path)
    .execute(pool)
    .await?;

    Ok(())
}
