//! Storage/CDN upload collaborator.
//!
//! The core only calls this from the encoding pipeline; quotas and retention
//! belong to the collaborator.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::{Error, Result};

/// Result of a successful upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResult {
    pub id: String,
    pub url: String,
}

/// Upload client trait.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn upload(&self, file: &Path) -> Result<UploadResult>;
}

/// HTTP upload client posting file bytes to the storage endpoint.
pub struct HttpStorageClient {
    client: reqwest::Client,
    upload_url: String,
}

impl HttpStorageClient {
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url: upload_url.into(),
        }
    }
}

#[async_trait]
impl StorageClient for HttpStorageClient {
    async fn upload(&self, file: &Path) -> Result<UploadResult> {
        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::validation(format!("invalid upload path {}", file.display())))?
            .to_string();

        let bytes = tokio::fs::read(file).await?;
        let size = bytes.len();

        let response = self
            .client
            .post(&self.upload_url)
            .query(&[("filename", filename.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("storage upload failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::upstream(format!(
                "storage upload rejected with status {}",
                response.status()
            )));
        }

        let result: UploadResult = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("invalid storage response: {}", e)))?;

        info!(file = %file.display(), size, url = %result.url, "upload complete");
        Ok(result)
    }
}

/// In-memory storage client for tests and local development.
#[derive(Default)]
pub struct InMemoryStorageClient {
    uploads: parking_lot::Mutex<Vec<String>>,
}

impl InMemoryStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl StorageClient for InMemoryStorageClient {
    async fn upload(&self, file: &Path) -> Result<UploadResult> {
        let path = file.display().to_string();
        self.uploads.lock().push(path.clone());
        Ok(UploadResult {
            id: uuid::Uuid::new_v4().to_string(),
            url: format!("memory://{}", path),
        })
    }
}
