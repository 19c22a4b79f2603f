//! Fill empty infobits with values found in uploaded files

use super::{HandlerContext, JobContext};
use crate::ai::prompts::{infobit_extraction_prompt, truncate};
use crate::ai::schema::{DocumentExtraction, EXTRACTION_SCHEMA};
use crate::ai::{generate_structured, GenerationOptions};
use crate::db::models::{ProjectInfobit, ProjectUpdate};
use crate::error::{Result, WorkerError};
use crate::repository::infobit_completion;
use crate::storage::PROJECT_DOCUMENTS_BUCKET;
use crate::task::progress::scaled;
use crate::task::{FileRef, InfobitExtractionParams, InfobitExtractionResult, Language, ProgressReporter};
use tracing::{info, warn};

pub async fn run(
    ctx: &HandlerContext,
    params: InfobitExtractionParams,
    job: &JobContext,
    progress: &ProgressReporter,
) -> Result<InfobitExtractionResult> {
    let project_id = job.require_project()?;
    progress.report(0, "Starting extraction...").await;

    let mut empty = ctx.repository.empty_infobits(project_id).await?;
    let mut result = InfobitExtractionResult::default();
    let total = params.files.len();

    for (i, file) in params.files.iter().enumerate() {
        progress
            .report(scaled(i, total, 90), format!("Processing: {}", file.name))
            .await;

        let data = match ctx.storage.download(PROJECT_DOCUMENTS_BUCKET, &file.path).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Could not download file {}: {}", file.path, e);
                continue;
            }
        };
        result.files_processed += 1;

        if empty.is_empty() {
            continue;
        }

        let extraction = match extract(ctx, params.language, file, data, &empty).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("Skipping {}: {}", file.name, e);
                continue;
            }
        };

        let source = format!("ai:{}", truncate(&file.name, 15));
        for value in extraction.extractions {
            let Some(pos) = empty.iter().position(|ib| ib.field_name == value.field_name) else {
                continue;
            };
            let infobit = empty.remove(pos);
            ctx.repository
                .fill_infobit(infobit.id, &value.extracted_value, &source, Some(value.confidence))
                .await?;
            result.fields_filled += 1;
        }
    }

    progress.report(95, "Updating completion...").await;
    let infobits = ctx.repository.project_infobits(project_id).await?;
    let completion = infobit_completion(&infobits);
    ctx.repository
        .update_project(project_id, &ProjectUpdate::infobits_completion(completion))
        .await?;

    info!(
        "Infobit extraction for project {}: {} files, {} fields filled, {}% complete",
        project_id, result.files_processed, result.fields_filled, completion
    );
    progress.report(100, "Complete").await;
    Ok(result)
}

async fn extract(
    ctx: &HandlerContext,
    language: Language,
    file: &FileRef,
    data: Vec<u8>,
    empty: &[ProjectInfobit],
) -> Result<DocumentExtraction> {
    let text = ctx.parse(data, &file.name).await?;
    if text.trim().is_empty() {
        return Err(WorkerError::DocumentError(format!(
            "No text extracted from {}",
            file.name
        )));
    }

    let prompt = infobit_extraction_prompt(language, &fields_description(empty), &text);
    generate_structured(
        ctx.model.as_ref(),
        EXTRACTION_SCHEMA,
        &prompt,
        &GenerationOptions::with_temperature(0.2),
    )
    .await
}

/// One `- name: label - description` line per field
fn fields_description(infobits: &[ProjectInfobit]) -> String {
    infobits
        .iter()
        .map(|ib| {
            format!(
                "- {}: {} - {}\n",
                ib.field_name,
                ib.field_label,
                ib.field_description.as_deref().unwrap_or("")
            )
        })
        .collect()
}
