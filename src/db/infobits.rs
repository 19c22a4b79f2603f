//! Project infobit database operations

use crate::ai::schema::InfobitDefinition;
use crate::db::models::ProjectInfobit;
use crate::db::DbPool;
use crate::error::Result;
use uuid::Uuid;

const INFOBIT_COLUMNS: &str = "id, project_id, field_name, field_label, field_label_en, \
     field_description, category, is_required, value, source, confidence, sort_order";

/// Get all infobits for a project
pub async fn project_infobits(pool: &DbPool, project_id: Uuid) -> Result<Vec<ProjectInfobit>> {
    let sql = format!(
        "SELECT {} FROM project_infobits WHERE project_id = $1 ORDER BY category, sort_order",
        INFOBIT_COLUMNS
    );
    let infobits = sqlx::query_as::<_, ProjectInfobit>(&sql)
        .bind(project_id)
        .fetch_all(pool)
        .await?;

    Ok(infobits)
}

/// Get infobits that have no value filled
pub async fn empty_infobits(pool: &DbPool, project_id: Uuid) -> Result<Vec<ProjectInfobit>> {
    let sql = format!(
        "SELECT {} FROM project_infobits \
         WHERE project_id = $1 AND COALESCE(value, '') = '' \
         ORDER BY category, sort_order",
        INFOBIT_COLUMNS
    );
    let infobits = sqlx::query_as::<_, ProjectInfobit>(&sql)
        .bind(project_id)
        .fetch_all(pool)
        .await?;

    Ok(infobits)
}

/// Set an infobit value; confidence is only overwritten when given
pub async fn fill_infobit(
    pool: &DbPool,
    infobit_id: Uuid,
    value: &str,
    source: &str,
    confidence: Option<f64>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE project_infobits
        SET value = $2,
            source = $3,
            confidence = COALESCE($4, confidence),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(infobit_id)
    .bind(value)
    .bind(source)
    .bind(confidence)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert infobit definitions for a project in one transaction
pub async fn create_infobits(
    pool: &DbPool,
    project_id: Uuid,
    infobits: &[InfobitDefinition],
) -> Result<usize> {
    let mut tx = pool.begin().await?;

    for infobit in infobits {
        sqlx::query(
            r#"
            INSERT INTO project_infobits
                (project_id, field_name, field_label, field_label_en, field_description,
                 category, is_required, value, source, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, '', 'manual', $8)
            "#,
        )
        .bind(project_id)
        .bind(&infobit.field_name)
        .bind(&infobit.field_label)
        .bind(&infobit.field_label_en)
        .bind(&infobit.field_description)
        .bind(&infobit.category)
        .bind(infobit.is_required)
        .bind(infobit.sort_order)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(infobits.len())
}
