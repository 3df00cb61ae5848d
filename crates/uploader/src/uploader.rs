//! The capability set every backend exposes.

use crate::error::{UploadError, UsageError};
use crate::http::{fetch_url, validate_url};
use async_trait::async_trait;
use bytes::Bytes;
use cidfan_core::input::{DirectoryInput, FileInput, FsAccess, ResolvedDirectory, UploadInput};
use cidfan_core::{UploadResult, canonical_json};
use tracing::{debug, warn};

/// File name used for text uploads.
pub const TEXT_FILE_NAME: &str = "text.txt";

/// File name used for JSON uploads.
pub const JSON_FILE_NAME: &str = "data.json";

/// One upload backend.
///
/// Implementors provide the two primitives; the five operations are built on
/// top of them and never return `Err` for runtime failures. `Err` is reserved
/// for [`UsageError`], such as path inputs without filesystem access.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Stable identifier, unique within a fan-out.
    fn id(&self) -> &str;

    fn fs_access(&self) -> FsAccess;

    /// Client used to fetch URL inputs.
    fn http_client(&self) -> &reqwest::Client;

    /// Upload one named file, returning its CID.
    async fn put_file(&self, name: &str, data: Bytes) -> Result<String, UploadError>;

    /// Upload a directory, returning the CID of its root.
    async fn put_directory(&self, directory: ResolvedDirectory) -> Result<String, UploadError>;

    /// Confirm the backend is reachable and accepts the configured credentials.
    async fn health_check(&self) -> Result<(), UploadError>;

    async fn file(&self, input: FileInput) -> Result<UploadResult, UsageError> {
        self.require_fs(input.requires_filesystem())?;
        let outcome = async {
            let (name, data) = input.load().await?;
            self.put_file(&name, data).await
        }
        .await;
        Ok(finish(self.id(), "file", outcome))
    }

    async fn text(&self, content: &str) -> UploadResult {
        let outcome = self
            .put_file(TEXT_FILE_NAME, Bytes::copy_from_slice(content.as_bytes()))
            .await;
        finish(self.id(), "text", outcome)
    }

    async fn json(&self, value: &serde_json::Value) -> UploadResult {
        let outcome = async {
            let encoded = canonical_json(value)?;
            self.put_file(JSON_FILE_NAME, encoded).await
        }
        .await;
        finish(self.id(), "json", outcome)
    }

    async fn directory(&self, input: DirectoryInput) -> Result<UploadResult, UsageError> {
        self.require_fs(input.requires_filesystem())?;
        let outcome = async {
            let resolved = input.resolve().await?;
            self.put_directory(resolved).await
        }
        .await;
        Ok(finish(self.id(), "directory", outcome))
    }

    async fn url(&self, url: &str) -> UploadResult {
        let outcome = async {
            let url = validate_url(url)?;
            let (name, data) = fetch_url(self.http_client(), &url).await?;
            self.put_file(&name, data).await
        }
        .await;
        finish(self.id(), "url", outcome)
    }

    /// Dispatch any [`UploadInput`] to the matching operation.
    async fn upload(&self, input: UploadInput) -> Result<UploadResult, UsageError> {
        match input {
            UploadInput::Bytes { name, data } => {
                let outcome = self.put_file(&name, data).await;
                Ok(finish(self.id(), "bytes", outcome))
            }
            UploadInput::Text(text) => Ok(self.text(&text).await),
            UploadInput::Json(value) => Ok(self.json(&value).await),
            UploadInput::Url(url) => Ok(self.url(&url).await),
            UploadInput::File(file) => self.file(file).await,
            UploadInput::Directory(directory) => self.directory(directory).await,
        }
    }

    fn require_fs(&self, needed: bool) -> Result<(), UsageError> {
        if needed && !self.fs_access().is_enabled() {
            return Err(UsageError::FilesystemUnavailable(self.id().to_string()));
        }
        Ok(())
    }
}

/// Fold an adapter outcome into an [`UploadResult`], logging it.
pub fn finish(id: &str, operation: &str, outcome: Result<String, UploadError>) -> UploadResult {
    match outcome {
        Ok(cid) => {
            debug!(backend = id, operation, %cid, "upload succeeded");
            UploadResult::success(cid)
        }
        Err(err) => {
            let kind = err.kind();
            warn!(backend = id, operation, ?kind, error = %err, "upload failed");
            UploadResult::failure(kind, err.to_string())
        }
    }
}
