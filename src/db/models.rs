//! Database models matching the application schema

use crate::error::WorkerError;
use crate::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Task Queue
// ============================================================================

/// TaskRow - Matches task_queue table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub task_type: String,
    pub task_data: Option<Value>,
    pub status: String,
    pub progress: Option<i32>,
    pub progress_message: Option<String>,
    pub worker_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result_data: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = WorkerError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: row.id,
            task_type: row.task_type,
            task_data: row.task_data.unwrap_or(Value::Null),
            user_id: row.user_id,
            project_id: row.project_id,
            status: row.status.parse()?,
            progress: row.progress.unwrap_or(0),
            progress_message: row.progress_message,
            worker_id: row.worker_id,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            result_data: row.result_data,
            error_message: row.error_message,
        })
    }
}

// ============================================================================
// Projects
// ============================================================================

/// Project - Matches projects table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub grant_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub overall_score: Option<f64>,
    pub infobits_completion: Option<i32>,
    pub infobits_generated: Option<bool>,
    pub created_at: DateTime<Utc>,
}

/// Partial project update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectUpdate {
    pub overall_score: Option<f64>,
    pub infobits_completion: Option<i32>,
    pub infobits_generated: Option<bool>,
    pub status: Option<String>,
}

impl ProjectUpdate {
    pub fn overall_score(score: f64) -> Self {
        Self {
            overall_score: Some(score),
            ..Default::default()
        }
    }

    pub fn infobits_completion(completion: i32) -> Self {
        Self {
            infobits_completion: Some(completion),
            ..Default::default()
        }
    }

    pub fn infobits_generated() -> Self {
        Self {
            infobits_generated: Some(true),
            ..Default::default()
        }
    }

    pub fn status(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            ..Default::default()
        }
    }
}

/// ProjectDocument - Matches project_documents table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub file_path: Option<String>,
    pub extracted_text: Option<String>,
    pub document_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl ProjectDocument {
    /// Stored text, if any non-blank text was extracted earlier
    pub fn text(&self) -> Option<&str> {
        self.extracted_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// ProjectInfobit - Matches project_infobits table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProjectInfobit {
    pub id: Uuid,
    pub project_id: Uuid,
    pub field_name: String,
    pub field_label: String,
    pub field_label_en: Option<String>,
    pub field_description: Option<String>,
    pub category: String,
    pub is_required: bool,
    pub value: Option<String>,
    pub source: Option<String>,
    pub confidence: Option<f64>,
    pub sort_order: i32,
}

impl ProjectInfobit {
    pub fn is_filled(&self) -> bool {
        self.value
            .as_deref()
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    }
}

/// ProjectSection - Matches project_sections table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProjectSection {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub sort_order: i32,
}

// ============================================================================
// Grants
// ============================================================================

/// Grant - Matches grants table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Grant {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// GrantRequirement - Matches grant_requirements table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GrantRequirement {
    pub id: Uuid,
    pub grant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub extracted_checklist: Option<Value>,
    pub sort_order: Option<i32>,
}

/// One item of an extracted requirement checklist, as stored
#[derive(Debug, Clone, PartialEq)]
pub enum ChecklistEntry {
    Item {
        name: String,
        description: String,
        is_mandatory: bool,
    },
    Text(String),
}

impl GrantRequirement {
    /// Checklist items, accepting both a bare array and `{"checklist": [...]}`
    pub fn checklist(&self) -> Vec<ChecklistEntry> {
        let items: &[Value] = match &self.extracted_checklist {
            Some(Value::Array(items)) => items.as_slice(),
            Some(Value::Object(map)) => match map.get("checklist") {
                Some(Value::Array(items)) => items.as_slice(),
                _ => &[],
            },
            _ => &[],
        };

        items
            .iter()
            .map(|item| match item {
                Value::Object(map) => {
                    let field = |key: &str| {
                        map.get(key)
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string()
                    };
                    ChecklistEntry::Item {
                        name: field("name"),
                        description: field("description"),
                        is_mandatory: map
                            .get("is_mandatory")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                    }
                }
                Value::String(text) => ChecklistEntry::Text(text.clone()),
                other => ChecklistEntry::Text(other.to_string()),
            })
            .collect()
    }
}

/// GrantExample - Matches grant_examples table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GrantExample {
    pub id: Uuid,
    pub grant_id: Uuid,
    pub name: String,
    pub extracted_text: Option<String>,
}

/// A project together with its grant, the grant's requirements and the
/// project's documents
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub project: Project,
    pub grant: Option<Grant>,
    pub requirements: Vec<GrantRequirement>,
    pub documents: Vec<ProjectDocument>,
}

impl ProjectContext {
    pub fn grant_name(&self) -> &str {
        self.grant.as_ref().map(|g| g.name.as_str()).unwrap_or("")
    }
}
