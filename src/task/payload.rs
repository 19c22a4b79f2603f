//! Typed task payloads, decoded from the queue's `task_data` JSON

use crate::error::{Result, WorkerError};
use crate::task::TaskType;
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Response language for AI output and generated documents
///
/// Anything other than `en`, including `null`, is treated as Estonian, the
/// application default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum Language {
    #[default]
    Et,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Et => "et",
            Language::En => "en",
        }
    }

    /// Choose between an Estonian and an English variant
    pub fn pick<'a>(&self, et: &'a str, en: &'a str) -> &'a str {
        match self {
            Language::Et => et,
            Language::En => en,
        }
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("en") {
            Language::En
        } else {
            Language::Et
        }
    }
}

impl From<Option<String>> for Language {
    fn from(value: Option<String>) -> Self {
        value.map(Language::from).unwrap_or_default()
    }
}

/// `null` reads as the type's default
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `null` and blank strings read as no id
fn optional_uuid<'de, D>(deserializer: D) -> std::result::Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => {
            Uuid::parse_str(raw.trim()).map(Some).map_err(de::Error::custom)
        }
        _ => Ok(None),
    }
}

/// Reference to an uploaded file in the project-documents bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(default)]
    pub path: String,
}

fn unknown_name() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfobitExtractionParams {
    #[serde(deserialize_with = "null_as_default")]
    pub files: Vec<FileRef>,
    pub language: Language,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfobitGenerationParams {
    #[serde(deserialize_with = "optional_uuid")]
    pub grant_id: Option<Uuid>,
    pub language: Language,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationParams {
    pub language: Language,
}

/// Generation accepts either `output_type` or the legacy boolean flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub language: Language,
    pub output_type: Option<String>,
    pub generate_docx: Option<bool>,
    pub generate_xlsx: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementExtractionParams {
    /// Empty means "every requirement without an extracted checklist"
    #[serde(deserialize_with = "null_as_default")]
    pub requirement_ids: Vec<Uuid>,
    pub language: Language,
}

/// Task input, one variant per task type
#[derive(Debug, Clone, PartialEq)]
pub enum TaskPayload {
    InfobitExtraction(InfobitExtractionParams),
    InfobitGeneration(InfobitGenerationParams),
    Evaluation(EvaluationParams),
    Generation(GenerationParams),
    RequirementExtraction(RequirementExtractionParams),
}

impl TaskPayload {
    /// Decode the stored task type and payload
    ///
    /// Fails with [`WorkerError::UnknownTaskType`] before looking at the payload
    /// when the type is not one the worker handles.
    pub fn decode(task_type: &str, task_data: Value) -> Result<Self> {
        let kind: TaskType = task_type.parse()?;
        let data = match task_data {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        let payload = match kind {
            TaskType::InfobitExtraction => Self::InfobitExtraction(params(kind, data)?),
            TaskType::InfobitGeneration => Self::InfobitGeneration(params(kind, data)?),
            TaskType::Evaluation => Self::Evaluation(params(kind, data)?),
            TaskType::Generation => Self::Generation(params(kind, data)?),
            TaskType::RequirementExtraction => Self::RequirementExtraction(params(kind, data)?),
        };
        Ok(payload)
    }

    pub fn task_type(&self) -> TaskType {
        match self {
            Self::InfobitExtraction(_) => TaskType::InfobitExtraction,
            Self::InfobitGeneration(_) => TaskType::InfobitGeneration,
            Self::Evaluation(_) => TaskType::Evaluation,
            Self::Generation(_) => TaskType::Generation,
            Self::RequirementExtraction(_) => TaskType::RequirementExtraction,
        }
    }
}

fn params<T: DeserializeOwned>(kind: TaskType, data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| WorkerError::InvalidTaskData {
        task_type: kind.as_str().to_string(),
        reason: e.to_string(),
    })
}
