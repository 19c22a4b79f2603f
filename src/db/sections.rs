//! Project section database operations

use crate::db::models::ProjectSection;
use crate::db::DbPool;
use crate::error::Result;
use uuid::Uuid;

/// Get all sections for a project, ordered by sort_order
pub async fn project_sections(pool: &DbPool, project_id: Uuid) -> Result<Vec<ProjectSection>> {
    let sections = sqlx::query_as::<_, ProjectSection>(
        r#"
        SELECT id, project_id, title, content, sort_order
        FROM project_sections
        WHERE project_id = $1
        ORDER BY sort_order
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(sections)
}
