//! Create the infobit fields a project's application needs

use super::{HandlerContext, JobContext};
use crate::ai::prompts::{infobit_generation_prompt, truncate};
use crate::ai::schema::{default_infobits, GeneratedInfobits, InfobitDefinition, INFOBITS_SCHEMA};
use crate::ai::{generate_structured, GenerationOptions};
use crate::db::models::{ChecklistEntry, GrantExample, GrantRequirement, ProjectUpdate};
use crate::error::Result;
use crate::task::{InfobitGenerationParams, InfobitGenerationResult, Language, ProgressReporter};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub async fn run(
    ctx: &HandlerContext,
    params: InfobitGenerationParams,
    job: &JobContext,
    progress: &ProgressReporter,
) -> Result<InfobitGenerationResult> {
    let project_id = job.require_project()?;
    progress.report(10, "Analyzing grant requirements...").await;

    let grant_id = match params.grant_id {
        Some(id) => Some(id),
        None => ctx
            .repository
            .project_context(project_id)
            .await?
            .and_then(|context| context.project.grant_id),
    };

    let generated = match grant_id {
        Some(grant_id) => generate_for_grant(ctx, grant_id, params.language).await?,
        None => Vec::new(),
    };

    progress.report(60, "Creating infobit fields...").await;
    let infobits = if generated.is_empty() {
        info!("Using default infobits for project {}", project_id);
        default_infobits(params.language)
    } else {
        generated
    };

    progress.report(80, "Saving to database...").await;
    let created = ctx.repository.create_infobits(project_id, &infobits).await?;
    debug!("Created {} infobits for project {}", created, project_id);
    ctx.repository
        .update_project(project_id, &ProjectUpdate::infobits_generated())
        .await?;

    progress.report(100, "Complete").await;
    Ok(InfobitGenerationResult {
        infobits_count: infobits.len(),
    })
}

/// Ask the model for the grant's infobits; empty when there is nothing to
/// go on or the model fails
async fn generate_for_grant(
    ctx: &HandlerContext,
    grant_id: Uuid,
    language: Language,
) -> Result<Vec<InfobitDefinition>> {
    let requirements = ctx.repository.grant_requirements(grant_id).await?;
    let examples = ctx.repository.grant_examples(grant_id).await?;

    let requirements_text = requirements_text(&requirements);
    let examples_text = examples_text(&examples);
    if requirements_text.is_empty() && examples_text.is_empty() {
        return Ok(Vec::new());
    }

    let prompt = infobit_generation_prompt(language, &requirements_text, &examples_text);
    match generate_structured::<GeneratedInfobits>(
        ctx.model.as_ref(),
        INFOBITS_SCHEMA,
        &prompt,
        &GenerationOptions::with_temperature(0.3),
    )
    .await
    {
        Ok(generated) => Ok(generated.infobits),
        Err(e) => {
            warn!("Error generating infobits for grant {}: {}", grant_id, e);
            Ok(Vec::new())
        }
    }
}

fn requirements_text(requirements: &[GrantRequirement]) -> String {
    let mut text = String::new();
    for req in requirements {
        for entry in req.checklist() {
            match entry {
                ChecklistEntry::Item {
                    name, description, ..
                } => text.push_str(&format!("- {}: {}\n", name, description)),
                ChecklistEntry::Text(item) => text.push_str(&format!("- {}\n", item)),
            }
        }
        text.push_str(&format!("\nDocument: {}\n", req.name));
    }
    text
}

fn examples_text(examples: &[GrantExample]) -> String {
    examples
        .iter()
        .filter_map(|ex| {
            let extracted = ex.extracted_text.as_deref().filter(|t| !t.is_empty())?;
            Some(format!(
                "\n=== Example: {} ===\n{}\n",
                ex.name,
                truncate(extracted, 3_000)
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requirements_text() {
        let req = GrantRequirement {
            id: Uuid::new_v4(),
            grant_id: Uuid::nil(),
            name: "Guidelines".to_string(),
            description: None,
            file_path: None,
            extracted_checklist: Some(json!({"checklist": [
                {"name": "Budget", "description": "Cost table", "is_mandatory": true}
            ]})),
            sort_order: None,
        };
        assert_eq!(
            requirements_text(&[req]),
            "- Budget: Cost table\n\nDocument: Guidelines\n"
        );
    }

    #[test]
    fn test_examples_text_skips_empty() {
        let examples = vec![
            GrantExample {
                id: Uuid::new_v4(),
                grant_id: Uuid::nil(),
                name: "Winner 2024".to_string(),
                extracted_text: Some("q".repeat(5_000)),
            },
            GrantExample {
                id: Uuid::new_v4(),
                grant_id: Uuid::nil(),
                name: "Blank".to_string(),
                extracted_text: None,
            },
        ];
        let text = examples_text(&examples);
        assert!(text.starts_with("\n=== Example: Winner 2024 ===\n"));
        assert!(!text.contains("Blank"));
        assert_eq!(text.matches('q').count(), 3_000);
    }
}
