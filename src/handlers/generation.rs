//! Generate application documents and spreadsheets for a project

use super::{requirements_outline, HandlerContext, JobContext};
use crate::ai::prompts::{content_prompt, ContentKind, ProjectBrief};
use crate::ai::GenerationOptions;
use crate::db::models::{ProjectContext, ProjectSection, ProjectUpdate};
use crate::error::{Result, WorkerError};
use crate::office::{Cell, DocxBuilder, XlsxBuilder};
use crate::storage::{project_object_path, DOCX_MIME, PROJECT_DOCUMENTS_BUCKET, XLSX_MIME};
use crate::task::{GenerationParams, GenerationResult, Language, ProgressReporter};
use chrono::Utc;
use tracing::{info, warn};

/// One kind of generated file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationProduct {
    Application,
    ApplicationFromSections,
    Budget,
    CoverLetter,
    ExecutiveSummary,
    Timeline,
    RiskAnalysis,
}

impl GenerationProduct {
    pub fn from_output_type(output_type: &str) -> Option<Self> {
        match output_type {
            "application_docx" => Some(Self::Application),
            "application_docx_from_sections" => Some(Self::ApplicationFromSections),
            "budget_xlsx" => Some(Self::Budget),
            "cover_letter_docx" => Some(Self::CoverLetter),
            "executive_summary_docx" => Some(Self::ExecutiveSummary),
            "timeline_xlsx" => Some(Self::Timeline),
            "risk_analysis_docx" => Some(Self::RiskAnalysis),
            _ => None,
        }
    }

    /// Result type recorded with the project result
    pub fn result_type(&self) -> &'static str {
        match self {
            Self::Application => "application_docx",
            Self::ApplicationFromSections => "application_docx_from_sections",
            Self::Budget => "budget_xlsx",
            Self::CoverLetter => "cover_letter_docx",
            Self::ExecutiveSummary => "executive_summary_docx",
            Self::Timeline => "timeline_xlsx",
            Self::RiskAnalysis => "risk_analysis_docx",
        }
    }

    fn file_stem(&self) -> &'static str {
        match self {
            Self::Application | Self::ApplicationFromSections => "application",
            Self::Budget => "budget",
            Self::CoverLetter => "cover_letter",
            Self::ExecutiveSummary => "executive_summary",
            Self::Timeline => "timeline",
            Self::RiskAnalysis => "risk_analysis",
        }
    }

    fn is_spreadsheet(&self) -> bool {
        matches!(self, Self::Budget | Self::Timeline)
    }

    fn file_name(&self) -> String {
        format!(
            "{}_{}.{}",
            self.file_stem(),
            Utc::now().format("%Y%m%d_%H%M%S"),
            if self.is_spreadsheet() { "xlsx" } else { "docx" }
        )
    }

    fn content_type(&self) -> &'static str {
        if self.is_spreadsheet() {
            XLSX_MIME
        } else {
            DOCX_MIME
        }
    }

    /// (generating, saving) progress steps
    fn progress_steps(&self) -> (u8, u8) {
        match self {
            Self::Application => (20, 40),
            Self::ApplicationFromSections => (40, 60),
            Self::Budget => (60, 80),
            _ => (20, 60),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Application | Self::ApplicationFromSections => "application document",
            Self::Budget => "budget spreadsheet",
            Self::CoverLetter => "cover letter",
            Self::ExecutiveSummary => "executive summary",
            Self::Timeline => "timeline",
            Self::RiskAnalysis => "risk analysis",
        }
    }

    fn store_path(&self, result: &mut GenerationResult, path: String) {
        let slot = match self {
            Self::Application | Self::ApplicationFromSections => &mut result.docx_path,
            Self::Budget => &mut result.xlsx_path,
            Self::CoverLetter => &mut result.cover_letter_path,
            Self::ExecutiveSummary => &mut result.executive_summary_path,
            Self::Timeline => &mut result.timeline_path,
            Self::RiskAnalysis => &mut result.risk_analysis_path,
        };
        *slot = Some(path);
    }
}

/// Products requested by the payload
///
/// `output_type` wins over the older `generate_docx` / `generate_xlsx` flags.
/// An unrecognised output type requests nothing.
pub fn requested_products(params: &GenerationParams) -> Vec<GenerationProduct> {
    match params.output_type.as_deref().filter(|t| !t.is_empty()) {
        Some(output_type) => match GenerationProduct::from_output_type(output_type) {
            Some(product) => vec![product],
            None => {
                warn!("Unknown output_type: {}", output_type);
                Vec::new()
            }
        },
        None => {
            let mut products = Vec::new();
            if params.generate_docx.unwrap_or(true) {
                products.push(GenerationProduct::Application);
            }
            if params.generate_xlsx.unwrap_or(false) {
                products.push(GenerationProduct::Budget);
            }
            products
        }
    }
}

pub async fn run(
    ctx: &HandlerContext,
    params: GenerationParams,
    job: &JobContext,
    progress: &ProgressReporter,
) -> Result<GenerationResult> {
    let project_id = job.require_project()?;
    progress.report(0, "Loading project data...").await;

    let context = ctx
        .repository
        .project_context(project_id)
        .await?
        .ok_or_else(|| WorkerError::NotFound("Project".to_string()))?;

    let writer = Writer {
        ctx,
        context: &context,
        language: params.language,
        requirements_text: requirements_outline(&context.requirements),
    };

    let mut result = GenerationResult::default();
    for product in requested_products(&params) {
        let (generating, saving) = product.progress_steps();
        if product != GenerationProduct::ApplicationFromSections {
            progress
                .report(generating, format!("Generating {}...", product.label()))
                .await;
        }
        let bytes = writer.build(product, progress).await?;

        let Some(bytes) = bytes else {
            warn!("No content generated for {}", product.result_type());
            continue;
        };

        progress.report(saving, format!("Saving {}...", product.label())).await;
        let path = project_object_path(job.user_id, project_id, &product.file_name());
        if let Err(e) = ctx
            .storage
            .upload(PROJECT_DOCUMENTS_BUCKET, &path, bytes, product.content_type())
            .await
        {
            warn!("Upload of {} failed: {}", product.result_type(), e);
            continue;
        }

        ctx.repository
            .create_project_result(project_id, product.result_type(), &path)
            .await?;
        info!("Generated {} for project {}: {}", product.result_type(), project_id, path);
        product.store_path(&mut result, path);
    }

    if !result.is_empty() {
        ctx.repository
            .update_project(project_id, &ProjectUpdate::status("completed"))
            .await?;
    }

    progress.report(100, "Generation complete").await;
    Ok(result)
}

/// Builds generated files for one project
struct Writer<'a> {
    ctx: &'a HandlerContext,
    context: &'a ProjectContext,
    language: Language,
    requirements_text: String,
}

impl Writer<'_> {
    /// File bytes, or `None` when the model produced nothing to write
    async fn build(
        &self,
        product: GenerationProduct,
        progress: &ProgressReporter,
    ) -> Result<Option<Vec<u8>>> {
        match product {
            GenerationProduct::Application => self.application_docx().await,
            GenerationProduct::Budget => {
                let content = self.content(ContentKind::Budget).await;
                Ok(Some(self.budget_xlsx(content.as_deref())?))
            }
            GenerationProduct::Timeline => {
                let content = self.content(ContentKind::Timeline).await;
                Ok(Some(self.timeline_xlsx(content.as_deref())?))
            }
            GenerationProduct::CoverLetter => {
                self.prose_docx(ContentKind::CoverLetter, self.language.pick("Kaaskiri", "Cover Letter"))
                    .await
            }
            GenerationProduct::ExecutiveSummary => {
                self.prose_docx(
                    ContentKind::ExecutiveSummary,
                    self.language.pick("Kokkuvõte", "Executive Summary"),
                )
                .await
            }
            GenerationProduct::RiskAnalysis => {
                self.prose_docx(
                    ContentKind::RiskAnalysis,
                    self.language.pick("Riskianalüüs", "Risk Analysis"),
                )
                .await
            }
            GenerationProduct::ApplicationFromSections => {
                progress.report(20, "Loading sections...").await;
                let sections = self
                    .ctx
                    .repository
                    .project_sections(self.context.project.id)
                    .await?;
                if sections.is_empty() {
                    return Err(WorkerError::Message(
                        "No sections found for this project".to_string(),
                    ));
                }
                progress
                    .report(40, "Generating application document from sections...")
                    .await;
                Ok(Some(self.sections_docx(&sections)?))
            }
        }
    }

    /// Model-written text of one kind; `None` on failure or empty output
    async fn content(&self, kind: ContentKind) -> Option<String> {
        let documents: Vec<(String, String)> = self
            .context
            .documents
            .iter()
            .filter_map(|doc| doc.text().map(|text| (doc.name.clone(), text.to_string())))
            .collect();

        let brief = ProjectBrief {
            name: &self.context.project.name,
            description: self.context.project.description.as_deref().unwrap_or(""),
            grant_name: self.context.grant_name(),
        };

        let prompt = content_prompt(self.language, kind, &brief, &self.requirements_text, &documents);
        let options = GenerationOptions::with_temperature(0.5).max_output_tokens(4_000);

        match self.ctx.model.generate_text(&prompt, &options).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!("Content generation ({:?}) failed: {}", kind, e);
                None
            }
        }
    }

    fn document_names(&self) -> Vec<&str> {
        self.context
            .documents
            .iter()
            .filter(|doc| doc.text().is_some())
            .map(|doc| doc.name.as_str())
            .collect()
    }

    fn title_block(&self, doc: &mut DocxBuilder) {
        doc.title(&self.context.project.name)
            .subtitle(&format!("Application for: {}", self.context.grant_name()))
            .spacer();
    }

    async fn application_docx(&self) -> Result<Option<Vec<u8>>> {
        let summary = self.content(ContentKind::Summary).await;
        let narrative = self.content(ContentKind::Narrative).await;
        if summary.is_none() && narrative.is_none() {
            return Ok(None);
        }

        let mut doc = DocxBuilder::new();
        self.title_block(&mut doc);

        if let Some(summary) = &summary {
            doc.heading(self.language.pick("Kokkuvõte", "Executive Summary"), 1)
                .paragraph(summary.trim());
        }
        if let Some(narrative) = &narrative {
            doc.heading(self.language.pick("Projekti kirjeldus", "Project Narrative"), 1)
                .rich_text(narrative);
        }

        doc.heading(self.language.pick("Lisadokumendid", "Supporting Documents"), 1)
            .paragraph(self.language.pick(
                "Taotlusega on kaasatud järgmised dokumendid:",
                "The following documents are included with this application:",
            ));
        for name in self.document_names() {
            doc.bullet(name);
        }

        doc.build().map(Some)
    }

    fn sections_docx(&self, sections: &[ProjectSection]) -> Result<Vec<u8>> {
        let mut doc = DocxBuilder::new();
        self.title_block(&mut doc);

        for section in sections {
            doc.heading(&section.title, 1);
            if let Some(content) = section.content.as_deref() {
                doc.rich_text(content);
            }
        }
        doc.build()
    }

    async fn prose_docx(&self, kind: ContentKind, heading: &str) -> Result<Option<Vec<u8>>> {
        let Some(content) = self.content(kind).await else {
            return Ok(None);
        };

        let mut doc = DocxBuilder::new();
        self.title_block(&mut doc);
        doc.heading(heading, 1).rich_text(&content);
        doc.build().map(Some)
    }

    fn budget_xlsx(&self, content: Option<&str>) -> Result<Vec<u8>> {
        let lang = self.language;
        let mut rows = content.map(parse_budget_rows).unwrap_or_default();
        if rows.is_empty() {
            rows = placeholder_budget(lang);
        }
        let total: f64 = rows.iter().map(|r| r.amount).sum();

        let mut sheet = XlsxBuilder::new(lang.pick("Eelarve", "Budget"));
        sheet
            .bold_row(vec![format!("Budget - {}", self.context.project.name).into()])
            .merge_row(0, 0, 3)
            .blank_row()
            .bold_row(vec![
                lang.pick("Kategooria", "Category").into(),
                lang.pick("Kirjeldus", "Description").into(),
                lang.pick("Summa (EUR)", "Amount (EUR)").into(),
                lang.pick("Põhjendus", "Justification").into(),
            ]);

        for row in rows {
            sheet.row(vec![
                row.category.into(),
                row.description.into(),
                Cell::Number(row.amount),
                row.justification.into(),
            ]);
        }

        sheet
            .blank_row()
            .bold_row(vec![
                lang.pick("KOKKU", "TOTAL").into(),
                Cell::Empty,
                Cell::Number(total),
            ])
            .column_width(0, 20.0)
            .column_width(1, 40.0)
            .column_width(2, 15.0)
            .column_width(3, 40.0);

        sheet.build()
    }

    fn timeline_xlsx(&self, content: Option<&str>) -> Result<Vec<u8>> {
        let lang = self.language;
        let mut rows = content.map(parse_timeline_rows).unwrap_or_default();
        if rows.is_empty() {
            rows = placeholder_timeline(lang);
        }

        let mut sheet = XlsxBuilder::new(lang.pick("Ajakava", "Timeline"));
        sheet
            .bold_row(vec![format!("Timeline - {}", self.context.project.name).into()])
            .merge_row(0, 0, 4)
            .blank_row()
            .bold_row(vec![
                lang.pick("Faas", "Phase").into(),
                lang.pick("Tegevused", "Activities").into(),
                lang.pick("Algus", "Start").into(),
                lang.pick("Lõpp", "End").into(),
                lang.pick("Väljundid", "Deliverables").into(),
            ]);

        for row in rows {
            sheet.row(row.into_iter().map(Cell::from).collect());
        }

        sheet
            .column_width(0, 25.0)
            .column_width(1, 45.0)
            .column_width(2, 12.0)
            .column_width(3, 12.0)
            .column_width(4, 35.0);

        sheet.build()
    }
}

/// One line of the budget table
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetRow {
    pub category: String,
    pub description: String,
    pub amount: f64,
    pub justification: String,
}

/// Cells of the pipe-separated rows in `content` with at least `min_cells`
/// cells, skipping headings, separator rows and header rows whose first cell
/// is one of `header_names`
fn table_rows(content: &str, min_cells: usize, header_names: &[&str]) -> Vec<Vec<String>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("---"))
        .filter(|line| line.contains('|'))
        .filter_map(|line| {
            let cells: Vec<String> = line
                .split('|')
                .map(str::trim)
                .filter(|cell| !cell.is_empty())
                .map(str::to_string)
                .collect();

            if cells.len() < min_cells {
                return None;
            }
            if cells
                .iter()
                .all(|cell| cell.chars().all(|c| matches!(c, '-' | ':' | ' ')))
            {
                return None;
            }
            let first = cells[0].trim_matches('*').to_lowercase();
            if header_names.contains(&first.as_str()) {
                return None;
            }
            Some(cells)
        })
        .collect()
}

/// Budget rows from a `Category | Description | Amount | Justification` table
pub fn parse_budget_rows(content: &str) -> Vec<BudgetRow> {
    table_rows(content, 3, &["category", "kategooria"])
        .into_iter()
        .map(|mut cells| {
            cells.resize(4, String::new());
            let mut cells = cells.into_iter();
            let mut next = || cells.next().unwrap_or_default();
            let category = next();
            let description = next();
            let amount = parse_amount(&next());
            BudgetRow {
                category,
                description,
                amount,
                justification: next(),
            }
        })
        .collect()
}

/// Amount in EUR; 0 when the cell is not a number
pub fn parse_amount(text: &str) -> f64 {
    let cleaned: String = text
        .replace("EUR", "")
        .chars()
        .filter(|c| !matches!(c, ',' | '€') && !c.is_whitespace())
        .collect();
    cleaned
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .unwrap_or(0.0)
}

/// Timeline rows from a `Phase | Activities | Start | End | Deliverables` table
pub fn parse_timeline_rows(content: &str) -> Vec<Vec<String>> {
    table_rows(content, 3, &["phase", "faas"])
        .into_iter()
        .map(|mut cells| {
            cells.truncate(5);
            cells
        })
        .collect()
}

fn placeholder_budget(language: Language) -> Vec<BudgetRow> {
    let rows: [(&str, &str); 5] = match language {
        Language::En => [
            ("Personnel", "Staff costs"),
            ("Equipment", "Equipment and materials"),
            ("Travel", "Travel and meetings"),
            ("Other", "Other direct costs"),
            ("Overhead", "Indirect costs"),
        ],
        Language::Et => [
            ("Personal", "Tööjõukulud"),
            ("Seadmed", "Seadmed ja materjalid"),
            ("Reisid", "Reisi- ja koosolekukulud"),
            ("Muud", "Muud otsesed kulud"),
            ("Üldkulud", "Kaudsed kulud"),
        ],
    };

    rows.iter()
        .map(|(category, description)| BudgetRow {
            category: category.to_string(),
            description: description.to_string(),
            amount: 0.0,
            justification: String::new(),
        })
        .collect()
}

fn placeholder_timeline(language: Language) -> Vec<Vec<String>> {
    let rows: [[&str; 5]; 5] = match language {
        Language::En => [
            ["Initiation", "Project setup and planning", "Month 1", "Month 2", "Project plan"],
            ["Development", "Core development work", "Month 3", "Month 8", ""],
            ["Testing and validation", "Testing and piloting", "Month 9", "Month 10", ""],
            ["Implementation", "Rollout of results", "Month 11", "Month 12", ""],
            ["Reporting and closeout", "Final reporting", "Month 12", "Month 12", "Final report"],
        ],
        Language::Et => [
            ["Algatamine", "Projekti käivitamine ja planeerimine", "Kuu 1", "Kuu 2", "Projektiplaan"],
            ["Arendus", "Põhiline arendustöö", "Kuu 3", "Kuu 8", ""],
            ["Testimine ja valideerimine", "Testimine ja piloteerimine", "Kuu 9", "Kuu 10", ""],
            ["Rakendamine", "Tulemuste juurutamine", "Kuu 11", "Kuu 12", ""],
            ["Aruandlus ja lõpetamine", "Lõpparuandlus", "Kuu 12", "Kuu 12", "Lõpparuanne"],
        ],
    };

    rows.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}
