//! Grant, requirement and example database operations

use crate::db::models::{Grant, GrantExample, GrantRequirement};
use crate::db::DbPool;
use crate::error::Result;
use serde_json::Value;
use uuid::Uuid;

const REQUIREMENT_COLUMNS: &str =
    "id, grant_id, name, description, file_path, extracted_checklist, sort_order";

/// Get a grant by ID
pub async fn get_grant(pool: &DbPool, grant_id: Uuid) -> Result<Option<Grant>> {
    let grant = sqlx::query_as::<_, Grant>("SELECT id, name, description FROM grants WHERE id = $1")
        .bind(grant_id)
        .fetch_optional(pool)
        .await?;

    Ok(grant)
}

/// Get all requirements for a grant
pub async fn grant_requirements(pool: &DbPool, grant_id: Uuid) -> Result<Vec<GrantRequirement>> {
    let sql = format!(
        "SELECT {} FROM grant_requirements WHERE grant_id = $1 ORDER BY sort_order",
        REQUIREMENT_COLUMNS
    );
    let requirements = sqlx::query_as::<_, GrantRequirement>(&sql)
        .bind(grant_id)
        .fetch_all(pool)
        .await?;

    Ok(requirements)
}

/// Get requirements by ID, in the order the IDs were given
pub async fn requirements_by_ids(pool: &DbPool, ids: &[Uuid]) -> Result<Vec<GrantRequirement>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {} FROM grant_requirements WHERE id = ANY($1) ORDER BY array_position($1, id)",
        REQUIREMENT_COLUMNS
    );
    let requirements = sqlx::query_as::<_, GrantRequirement>(&sql)
        .bind(ids)
        .fetch_all(pool)
        .await?;

    Ok(requirements)
}

/// Get requirements whose checklist has not been extracted yet
pub async fn unprocessed_requirements(pool: &DbPool) -> Result<Vec<GrantRequirement>> {
    let sql = format!(
        "SELECT {} FROM grant_requirements WHERE extracted_checklist IS NULL ORDER BY sort_order",
        REQUIREMENT_COLUMNS
    );
    let requirements = sqlx::query_as::<_, GrantRequirement>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(requirements)
}

/// Save an extracted checklist on a requirement
pub async fn store_checklist(pool: &DbPool, requirement_id: Uuid, checklist: &Value) -> Result<()> {
    sqlx::query("UPDATE grant_requirements SET extracted_checklist = $2 WHERE id = $1")
        .bind(requirement_id)
        .bind(checklist)
        .execute(pool)
        .await?;

    Ok(())
}

/// Get example application documents for a grant
pub async fn grant_examples(pool: &DbPool, grant_id: Uuid) -> Result<Vec<GrantExample>> {
    let examples = sqlx::query_as::<_, GrantExample>(
        r#"
        SELECT id, grant_id, name, extracted_text
        FROM grant_examples
        WHERE grant_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(grant_id)
    .fetch_all(pool)
    .await?;

    Ok(examples)
}
