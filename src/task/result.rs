//! Typed handler results, encoded into the queue's `result_data` JSON

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfobitExtractionResult {
    pub files_processed: usize,
    pub fields_filled: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfobitGenerationResult {
    pub infobits_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentScore {
    pub document: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub documents_evaluated: usize,
    /// `None` when no document could be evaluated
    pub overall_score: Option<f64>,
    pub scores: Vec<DocumentScore>,
}

/// Storage paths of whatever the generation task produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docx_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xlsx_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_letter_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executive_summary_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_analysis_path: Option<String>,
}

impl GenerationResult {
    pub fn is_empty(&self) -> bool {
        self.docx_path.is_none()
            && self.xlsx_path.is_none()
            && self.cover_letter_path.is_none()
            && self.executive_summary_path.is_none()
            && self.timeline_path.is_none()
            && self.risk_analysis_path.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementExtractionResult {
    pub requirements_processed: usize,
    pub items_extracted: usize,
}

/// Handler output, one variant per task type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskResult {
    InfobitExtraction(InfobitExtractionResult),
    InfobitGeneration(InfobitGenerationResult),
    Evaluation(EvaluationResult),
    Generation(GenerationResult),
    RequirementExtraction(RequirementExtractionResult),
}

impl TaskResult {
    /// Encode as the JSON object stored in `result_data`
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl From<InfobitExtractionResult> for TaskResult {
    fn from(result: InfobitExtractionResult) -> Self {
        Self::InfobitExtraction(result)
    }
}

impl From<InfobitGenerationResult> for TaskResult {
    fn from(result: InfobitGenerationResult) -> Self {
        Self::InfobitGeneration(result)
    }
}

impl From<EvaluationResult> for TaskResult {
    fn from(result: EvaluationResult) -> Self {
        Self::Evaluation(result)
    }
}

impl From<GenerationResult> for TaskResult {
    fn from(result: GenerationResult) -> Self {
        Self::Generation(result)
    }
}

impl From<RequirementExtractionResult> for TaskResult {
    fn from(result: RequirementExtractionResult) -> Self {
        Self::RequirementExtraction(result)
    }
}
