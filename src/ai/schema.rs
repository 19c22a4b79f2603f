//! Structured output types requested from the language model

use crate::task::Language;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const REQUIREMENTS_SCHEMA: &str = "extracted_requirements";
pub const EVALUATION_SCHEMA: &str = "document_evaluation";
pub const EXTRACTION_SCHEMA: &str = "document_extraction";
pub const INFOBITS_SCHEMA: &str = "generated_infobits";

/// Single requirement item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequirementItem {
    /// Name of the requirement
    pub name: String,
    /// Detailed description of what is needed
    #[serde(default)]
    pub description: String,
    /// Whether this requirement is mandatory
    #[serde(default)]
    pub is_mandatory: bool,
}

/// Checklist extracted from grant documentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedRequirements {
    pub checklist: Vec<RequirementItem>,
    /// Brief summary of all requirements
    #[serde(default)]
    pub summary: String,
}

/// Annotation for a specific part of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentAnnotation {
    /// The text being annotated (max 100 chars)
    pub text_segment: String,
    pub annotation: String,
    /// One of: error, warning, suggestion
    pub severity: String,
}

/// Evaluation of one document against the grant requirements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentEvaluation {
    /// Score from 1 to 10
    pub score: f64,
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<DocumentAnnotation>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl DocumentEvaluation {
    /// Force the score into the 1..=10 range the prompt asks for
    pub fn clamp_score(mut self) -> Self {
        self.score = if self.score.is_finite() {
            self.score.clamp(1.0, 10.0)
        } else {
            1.0
        };
        self
    }
}

/// A value found in a document for one infobit field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedInfobitValue {
    /// The field_name of the infobit being filled
    pub field_name: String,
    pub extracted_value: String,
    /// Confidence between 0.0 and 1.0
    #[serde(default)]
    pub confidence: f64,
    /// Supporting snippet from the document (max 100 chars)
    #[serde(default)]
    pub source_text: String,
}

/// All values extracted from one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentExtraction {
    #[serde(default)]
    pub extractions: Vec<ExtractedInfobitValue>,
}

/// Definition of one information field an applicant has to provide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InfobitDefinition {
    /// Machine-readable identifier in snake_case
    pub field_name: String,
    /// Label in the response language
    pub field_label: String,
    #[serde(default)]
    pub field_label_en: String,
    #[serde(default)]
    pub field_description: String,
    /// One of: general, company, project, budget, team, timeline, outcomes
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_required")]
    pub is_required: bool,
    #[serde(default)]
    pub sort_order: i32,
}

fn default_category() -> String {
    "general".to_string()
}

fn default_required() -> bool {
    true
}

/// Infobit fields generated for a grant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedInfobits {
    #[serde(default)]
    pub infobits: Vec<InfobitDefinition>,
}

/// (field_name, Estonian label, English label, Estonian description,
/// English description, category, required, sort order)
type DefaultInfobit = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    bool,
    i32,
);

const DEFAULT_INFOBITS: [DefaultInfobit; 13] = [
    ("company_name", "Ettevõtte nimi", "Company Name", "Taotleja ettevõtte täielik nimi", "Full legal name of the applying company", "company", true, 1),
    ("registration_number", "Registrikood", "Registration Number", "Äriregistri kood", "Business registry code", "company", true, 2),
    ("contact_person", "Kontaktisik", "Contact Person", "Projekti kontaktisiku nimi", "Name of the project contact person", "company", true, 3),
    ("contact_email", "E-post", "Email", "Kontaktisiku e-posti aadress", "Contact person's email address", "company", true, 4),
    ("project_title", "Projekti pealkiri", "Project Title", "Projekti lühike ja tabav pealkiri", "Short and descriptive project title", "general", true, 1),
    ("project_summary", "Projekti kokkuvõte", "Project Summary", "Projekti lühikokkuvõte (1-2 lõiku)", "Brief project summary (1-2 paragraphs)", "general", true, 2),
    ("project_objectives", "Projekti eesmärgid", "Project Objectives", "Projekti peamised eesmärgid ja oodatavad tulemused", "Main project objectives and expected outcomes", "project", true, 1),
    ("methodology", "Metoodika", "Methodology", "Projekti läbiviimise metoodika ja tegevused", "Project methodology and activities", "project", true, 2),
    ("total_budget", "Kogueelarve", "Total Budget", "Projekti kogueelarve eurodes", "Total project budget in EUR", "budget", true, 1),
    ("requested_funding", "Taotletav toetus", "Requested Funding", "Toetusena taotletav summa eurodes", "Amount requested as grant in EUR", "budget", true, 2),
    ("project_duration", "Projekti kestus", "Project Duration", "Projekti kestus kuudes", "Project duration in months", "timeline", true, 1),
    ("start_date", "Alguskuupäev", "Start Date", "Projekti planeeritud alguskuupäev", "Planned project start date", "timeline", false, 2),
    ("expected_outcomes", "Oodatavad tulemused", "Expected Outcomes", "Projekti oodatavad tulemused ja mõju", "Expected project results and impact", "outcomes", true, 1),
];

/// Fallback infobits used when none can be generated for a grant
pub fn default_infobits(language: Language) -> Vec<InfobitDefinition> {
    DEFAULT_INFOBITS
        .iter()
        .map(
            |&(name, label_et, label_en, desc_et, desc_en, category, required, order)| {
                InfobitDefinition {
                    field_name: name.to_string(),
                    field_label: language.pick(label_et, label_en).to_string(),
                    field_label_en: label_en.to_string(),
                    field_description: language.pick(desc_et, desc_en).to_string(),
                    category: category.to_string(),
                    is_required: required,
                    sort_order: order,
                }
            },
        )
        .collect()
}
