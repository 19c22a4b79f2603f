//! Error types for grant-worker

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Invalid task_data for {task_type}: {reason}")]
    InvalidTaskData { task_type: String, reason: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Language model error: {0}")]
    ModelError(String),

    #[error("OpenAI API error: {0}")]
    OpenAiError(#[from] async_openai::error::OpenAIError),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Document error: {0}")]
    DocumentError(String),

    #[error("Archive error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("File system error: {0}")]
    FsError(#[from] std::io::Error),

    #[error("Task timed out after {}s", .0.as_secs())]
    TaskTimeout(Duration),

    /// Free-form failure whose display text is the message itself
    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error_keeps_its_text() {
        let err: WorkerError = io::Error::new(io::ErrorKind::NotFound, "template.docx missing").into();
        assert_eq!(err.to_string(), "File system error: template.docx missing");
    }

    #[test]
    fn test_timeout_display() {
        let err = WorkerError::TaskTimeout(Duration::from_millis(90_500));
        assert_eq!(err.to_string(), "Task timed out after 90s");
    }
}
