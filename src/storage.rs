//! Blob storage for uploaded and generated files

use crate::error::{Result, WorkerError};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;
use url::Url;
use uuid::Uuid;

/// Bucket with project uploads and generated results
pub const PROJECT_DOCUMENTS_BUCKET: &str = "project-documents";

/// Bucket with grant requirement documents
pub const GRANT_REQUIREMENTS_BUCKET: &str = "grant-requirements";

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Download and upload of file bytes by bucket and path
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;

    async fn upload(&self, bucket: &str, path: &str, data: Vec<u8>, content_type: &str)
        -> Result<()>;
}

/// Storage client for a Supabase-compatible object API
pub struct HttpBlobStorage {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl HttpBlobStorage {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        // A trailing slash keeps the last path segment when joining
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: Url::parse(&normalized)?,
            api_key: api_key.to_string(),
        })
    }

    /// Create from STORAGE_URL and STORAGE_KEY
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("STORAGE_URL")
            .map_err(|_| WorkerError::ConfigError("STORAGE_URL not set".to_string()))?;
        let key = std::env::var("STORAGE_KEY")
            .map_err(|_| WorkerError::ConfigError("STORAGE_KEY not set".to_string()))?;
        Self::new(&url, &key)
    }

    /// Object URL with every path segment percent-encoded
    ///
    /// Empty, `.` and `..` segments are dropped.
    fn object_url(&self, bucket: &str, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| WorkerError::StorageError(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(["storage", "v1", "object", bucket])
            .extend(
                path.split('/')
                    .filter(|segment| !matches!(*segment, "" | "." | "..")),
            );
        Ok(url)
    }
}

#[async_trait]
impl BlobStorage for HttpBlobStorage {
    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let url = self.object_url(bucket, path)?;
        debug!("Downloading {}", url);

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header("apikey", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WorkerError::StorageError(format!(
                "Download of {}/{} failed with status {}",
                bucket,
                path,
                response.status()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = self.object_url(bucket, path)?;
        let size = data.len();

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header("apikey", &self.api_key)
            .header(CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::StorageError(format!(
                "Upload of {}/{} failed with status {}: {}",
                bucket, path, status, body
            )));
        }

        info!("Uploaded {} bytes to {}/{}", size, bucket, path);
        Ok(())
    }
}

/// Storage used when no storage endpoint is configured; every call fails
pub struct UnconfiguredStorage;

#[async_trait]
impl BlobStorage for UnconfiguredStorage {
    async fn download(&self, _bucket: &str, _path: &str) -> Result<Vec<u8>> {
        Err(not_configured())
    }

    async fn upload(
        &self,
        _bucket: &str,
        _path: &str,
        _data: Vec<u8>,
        _content_type: &str,
    ) -> Result<()> {
        Err(not_configured())
    }
}

fn not_configured() -> WorkerError {
    WorkerError::StorageError("Blob storage is not configured".to_string())
}

/// Build the storage client from the environment
///
/// Falls back to [`UnconfiguredStorage`] when the variables are absent, so
/// the worker can still run tasks that never touch files.
pub fn storage_from_env() -> Result<Arc<dyn BlobStorage>> {
    match (std::env::var("STORAGE_URL"), std::env::var("STORAGE_KEY")) {
        (Ok(url), Ok(key)) if !url.is_empty() && !key.is_empty() => {
            Ok(Arc::new(HttpBlobStorage::new(&url, &key)?))
        }
        _ => {
            warn!("STORAGE_URL/STORAGE_KEY not set - file downloads and uploads will fail");
            Ok(Arc::new(UnconfiguredStorage))
        }
    }
}

/// Make a file name safe for use in a storage path
///
/// Decomposes accented letters (NFKD) and keeps their ASCII base, turns
/// spaces into underscores and drops everything outside `[A-Za-z0-9_.-]`.
pub fn sanitize_filename(filename: &str) -> String {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    let invalid = INVALID.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_\-.]").expect("valid regex"));

    let folded: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();

    let safe = invalid.replace_all(&folded, "").into_owned();
    if safe.is_empty() || safe == "." {
        "file".to_string()
    } else {
        safe
    }
}

/// Storage path for a generated project file: `<user>/<project>/<uuid>_<name>`
pub fn project_object_path(user_id: Option<Uuid>, project_id: Uuid, filename: &str) -> String {
    let owner = user_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());
    format!(
        "{}/{}/{}_{}",
        owner,
        project_id,
        Uuid::new_v4(),
        sanitize_filename(filename)
    )
}

/// Last path segment of a storage path
pub fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
