//! Score project documents against the grant requirements

use super::{requirements_with_checklists, HandlerContext, JobContext};
use crate::ai::prompts::evaluation_prompt;
use crate::ai::schema::{DocumentEvaluation, EVALUATION_SCHEMA};
use crate::ai::{generate_structured, GenerationOptions};
use crate::db::models::{ProjectDocument, ProjectUpdate};
use crate::error::{Result, WorkerError};
use crate::storage::PROJECT_DOCUMENTS_BUCKET;
use crate::task::progress::scaled;
use crate::task::{DocumentScore, EvaluationParams, EvaluationResult, ProgressReporter};
use tracing::{info, warn};

pub async fn run(
    ctx: &HandlerContext,
    params: EvaluationParams,
    job: &JobContext,
    progress: &ProgressReporter,
) -> Result<EvaluationResult> {
    let project_id = job.require_project()?;
    progress.report(0, "Loading project data...").await;

    let context = ctx
        .repository
        .project_context(project_id)
        .await?
        .ok_or_else(|| WorkerError::NotFound("Project".to_string()))?;

    let documents = ctx.repository.project_documents(project_id).await?;
    if documents.is_empty() {
        return Err(WorkerError::Message("No documents found".to_string()));
    }

    let requirements_text = requirements_with_checklists(&context.requirements);
    let options = GenerationOptions::with_temperature(0.4);
    let total = documents.len();
    let mut scores = Vec::new();

    for (i, doc) in documents.iter().enumerate() {
        progress
            .report(scaled(i, total, 90), format!("Evaluating: {}", doc.name))
            .await;

        let text = match doc.text() {
            Some(text) => text.to_string(),
            None => match extract_and_store(ctx, doc).await? {
                Some(text) => text,
                None => continue,
            },
        };

        let prompt = evaluation_prompt(params.language, &requirements_text, &doc.name, &text);
        let evaluation =
            match generate_structured::<DocumentEvaluation>(ctx.model.as_ref(), EVALUATION_SCHEMA, &prompt, &options)
                .await
            {
                Ok(evaluation) => evaluation.clamp_score(),
                Err(e) => {
                    warn!("Evaluation of {} failed: {}", doc.name, e);
                    continue;
                }
            };

        ctx.repository
            .store_document_evaluation(doc.id, &evaluation)
            .await?;
        scores.push(DocumentScore {
            document: doc.name.clone(),
            score: evaluation.score,
        });
    }

    let overall_score = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64)
    };

    if let Some(score) = overall_score {
        ctx.repository
            .update_project(project_id, &ProjectUpdate::overall_score(score))
            .await?;
        info!("Project {} overall score: {:.1}", project_id, score);
    }

    progress.report(100, "Evaluation complete").await;
    Ok(EvaluationResult {
        documents_evaluated: scores.len(),
        overall_score,
        scores,
    })
}

/// Download and parse a document without stored text, saving what was found
async fn extract_and_store(ctx: &HandlerContext, doc: &ProjectDocument) -> Result<Option<String>> {
    let Some(path) = doc.file_path.as_deref().filter(|p| !p.is_empty()) else {
        return Ok(None);
    };

    let text = match ctx
        .download_text(PROJECT_DOCUMENTS_BUCKET, path, &doc.name)
        .await
    {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => return Ok(None),
        Err(e) => {
            warn!("Could not read {}: {}", doc.name, e);
            return Ok(None);
        }
    };

    ctx.repository.store_document_text(doc.id, &text).await?;
    Ok(Some(text))
}
