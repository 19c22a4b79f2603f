//! Turn grant requirement documents into checklists

use super::HandlerContext;
use crate::ai::prompts::requirements_prompt;
use crate::ai::schema::{ExtractedRequirements, RequirementItem, REQUIREMENTS_SCHEMA};
use crate::ai::{generate_structured, GenerationOptions};
use crate::error::{Result, WorkerError};
use crate::storage::{file_name_of, GRANT_REQUIREMENTS_BUCKET};
use crate::task::progress::scaled;
use crate::task::{Language, ProgressReporter, RequirementExtractionParams, RequirementExtractionResult};
use tracing::{info, warn};

pub async fn run(
    ctx: &HandlerContext,
    params: RequirementExtractionParams,
    progress: &ProgressReporter,
) -> Result<RequirementExtractionResult> {
    progress.report(0, "Starting extraction...").await;

    let requirements = if params.requirement_ids.is_empty() {
        ctx.repository.unprocessed_requirements().await?
    } else {
        ctx.repository
            .requirements_by_ids(&params.requirement_ids)
            .await?
    };

    let mut result = RequirementExtractionResult::default();
    if requirements.is_empty() {
        progress.report(100, "No requirements to process").await;
        return Ok(result);
    }

    let total = requirements.len();
    for (i, req) in requirements.iter().enumerate() {
        progress
            .report(scaled(i, total, 90), format!("Processing: {}", req.name))
            .await;

        let Some(path) = req.file_path.as_deref().filter(|p| !p.is_empty()) else {
            continue;
        };

        let checklist = match extract_checklist(ctx, params.language, path).await {
            Ok(checklist) => checklist,
            Err(e) => {
                warn!("Requirement {} skipped: {}", req.id, e);
                continue;
            }
        };

        ctx.repository
            .store_requirement_checklist(req.id, &checklist)
            .await?;

        if !checklist.is_empty() {
            result.requirements_processed += 1;
            result.items_extracted += checklist.len();
        }
    }

    info!(
        "Extracted {} checklist items from {} requirements",
        result.items_extracted, result.requirements_processed
    );
    progress.report(100, "Extraction complete").await;
    Ok(result)
}

async fn extract_checklist(
    ctx: &HandlerContext,
    language: Language,
    path: &str,
) -> Result<Vec<RequirementItem>> {
    let text = ctx
        .download_text(GRANT_REQUIREMENTS_BUCKET, path, file_name_of(path))
        .await?;
    if text.trim().is_empty() {
        return Err(WorkerError::DocumentError(format!(
            "No text extracted from {}",
            path
        )));
    }

    let extracted: ExtractedRequirements = generate_structured(
        ctx.model.as_ref(),
        REQUIREMENTS_SCHEMA,
        &requirements_prompt(language, &text),
        &GenerationOptions::with_temperature(0.3),
    )
    .await?;
    Ok(extracted.checklist)
}
