//! Project document database operations

use crate::ai::schema::DocumentEvaluation;
use crate::db::models::ProjectDocument;
use crate::db::DbPool;
use crate::error::Result;
use serde_json::json;
use uuid::Uuid;

/// Get all documents for a project, newest first
pub async fn project_documents(pool: &DbPool, project_id: Uuid) -> Result<Vec<ProjectDocument>> {
    let documents = sqlx::query_as::<_, ProjectDocument>(
        r#"
        SELECT id, project_id, name, file_path, extracted_text, document_score, created_at
        FROM project_documents
        WHERE project_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(documents)
}

/// Save text extracted from a document file
pub async fn update_extracted_text(pool: &DbPool, document_id: Uuid, text: &str) -> Result<()> {
    sqlx::query("UPDATE project_documents SET extracted_text = $2 WHERE id = $1")
        .bind(document_id)
        .bind(text)
        .execute(pool)
        .await?;

    Ok(())
}

/// Save an AI evaluation on a document
pub async fn store_evaluation(
    pool: &DbPool,
    document_id: Uuid,
    evaluation: &DocumentEvaluation,
) -> Result<()> {
    let comments = json!({
        "summary": evaluation.summary,
        "strengths": evaluation.strengths,
        "weaknesses": evaluation.weaknesses,
        "recommendations": evaluation.recommendations,
    });

    sqlx::query(
        r#"
        UPDATE project_documents
        SET ai_evaluation = $2,
            document_score = $3,
            annotations = $4,
            comments = $5
        WHERE id = $1
        "#,
    )
    .bind(document_id)
    .bind(serde_json::to_value(evaluation)?)
    .bind(evaluation.score)
    .bind(serde_json::to_value(&evaluation.annotations)?)
    .bind(comments)
    .execute(pool)
    .await?;

    Ok(())
}
