//! Fan-out of one upload to every registered backend.

use crate::error::{UploadError, UsageError};
use crate::http::{fetch_url, validate_url};
use crate::uploader::{JSON_FILE_NAME, TEXT_FILE_NAME, Uploader, finish};
use bytes::Bytes;
use cidfan_core::input::{DirectoryInput, FileInput, FsAccess, UploadInput};
use cidfan_core::{AggregateUploadResult, ErrorKind, UploadResult, canonical_json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Runs each operation against every backend concurrently.
///
/// Path and URL inputs are read once and handed to every backend as
/// in-memory content. Results come back in registration order.
#[derive(Clone)]
pub struct FanoutUploader {
    uploaders: Vec<Arc<dyn Uploader>>,
    fs_access: FsAccess,
    cancel: Option<CancellationToken>,
}

impl std::fmt::Debug for FanoutUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutUploader")
            .field("uploaders", &self.ids())
            .field("fs_access", &self.fs_access)
            .finish_non_exhaustive()
    }
}

impl FanoutUploader {
    /// Fails immediately on an empty list or a repeated identifier.
    pub fn new(uploaders: Vec<Arc<dyn Uploader>>) -> Result<Self, UsageError> {
        if uploaders.is_empty() {
            return Err(UsageError::NoUploaders);
        }
        let mut seen = HashSet::with_capacity(uploaders.len());
        for uploader in &uploaders {
            if !seen.insert(uploader.id().to_string()) {
                return Err(UsageError::DuplicateUploader(uploader.id().to_string()));
            }
        }
        let fs_access = FsAccess::from_flag(uploaders.iter().all(|u| u.fs_access().is_enabled()));
        Ok(Self {
            uploaders,
            fs_access,
            cancel: None,
        })
    }

    pub fn with_fs_access(mut self, fs_access: FsAccess) -> Self {
        self.fs_access = fs_access;
        self
    }

    /// Backends still running when `token` fires resolve as cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn ids(&self) -> Vec<&str> {
        self.uploaders.iter().map(|u| u.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.uploaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploaders.is_empty()
    }

    pub async fn file(&self, input: FileInput) -> Result<AggregateUploadResult, UsageError> {
        self.upload(UploadInput::File(input)).await
    }

    pub async fn text(&self, content: &str) -> AggregateUploadResult {
        self.dispatch("text", UploadInput::Bytes {
            name: TEXT_FILE_NAME.to_string(),
            data: Bytes::copy_from_slice(content.as_bytes()),
        })
        .await
    }

    pub async fn json(&self, value: &serde_json::Value) -> AggregateUploadResult {
        match canonical_json(value) {
            Ok(data) => {
                self.dispatch("json", UploadInput::Bytes {
                    name: JSON_FILE_NAME.to_string(),
                    data,
                })
                .await
            }
            Err(err) => self.fail_all("json", err.into()),
        }
    }

    pub async fn directory(&self, input: DirectoryInput) -> Result<AggregateUploadResult, UsageError> {
        self.upload(UploadInput::Directory(input)).await
    }

    pub async fn url(&self, url: &str) -> AggregateUploadResult {
        let fetched = async {
            let url = validate_url(url)?;
            let client = self.uploaders[0].http_client();
            fetch_url(client, &url).await
        }
        .await;
        match fetched {
            Ok((name, data)) => self.dispatch("url", UploadInput::Bytes { name, data }).await,
            Err(err) => self.fail_all("url", err),
        }
    }

    /// Upload any input to every backend.
    pub async fn upload(&self, input: UploadInput) -> Result<AggregateUploadResult, UsageError> {
        match input {
            UploadInput::File(file) => {
                self.require_fs(file.requires_filesystem())?;
                Ok(match file.load().await {
                    Ok((name, data)) => self.dispatch("file", UploadInput::Bytes { name, data }).await,
                    Err(err) => self.fail_all("file", err.into()),
                })
            }
            UploadInput::Directory(directory) => {
                self.require_fs(directory.requires_filesystem())?;
                Ok(match directory.resolve().await {
                    Ok(resolved) => {
                        let input = UploadInput::Directory(DirectoryInput::Files {
                            name: resolved.name,
                            files: resolved.entries,
                        });
                        self.dispatch("directory", input).await
                    }
                    Err(err) => self.fail_all("directory", err.into()),
                })
            }
            UploadInput::Text(text) => Ok(self.text(&text).await),
            UploadInput::Json(value) => Ok(self.json(&value).await),
            UploadInput::Url(url) => Ok(self.url(&url).await),
            bytes @ UploadInput::Bytes { .. } => Ok(self.dispatch("bytes", bytes).await),
        }
    }

    fn require_fs(&self, needed: bool) -> Result<(), UsageError> {
        if needed && !self.fs_access.is_enabled() {
            return Err(UsageError::FilesystemUnavailable("fan-out".to_string()));
        }
        Ok(())
    }

    /// Same failure for every backend, without contacting any of them.
    fn fail_all(&self, operation: &'static str, err: UploadError) -> AggregateUploadResult {
        warn!(operation, error = %err, "upload input rejected");
        let message = err.to_string();
        let kind = err.kind();
        let results = self
            .uploaders
            .iter()
            .map(|u| (u.id().to_string(), UploadResult::failure(kind, message.clone())))
            .collect();
        AggregateUploadResult::from_results(results)
    }

    /// `input` holds no filesystem paths by the time it gets here.
    ///
    /// Every backend runs as its own task, so a slow or CPU-heavy backend
    /// never holds up the others or the cancellation check.
    #[instrument(skip(self, input), fields(backends = self.uploaders.len()))]
    async fn dispatch(&self, operation: &'static str, input: UploadInput) -> AggregateUploadResult {
        let mut tasks = JoinSet::new();
        let mut slots = HashMap::with_capacity(self.uploaders.len());
        for (index, uploader) in self.uploaders.iter().enumerate() {
            let uploader = Arc::clone(uploader);
            let input = input.clone();
            let cancel = self.cancel.clone();
            let handle = tasks.spawn(async move {
                let upload = async {
                    uploader.upload(input).await.unwrap_or_else(|usage| {
                        UploadResult::failure(ErrorKind::Input, usage.to_string())
                    })
                };
                match cancel {
                    Some(token) => tokio::select! {
                        result = upload => result,
                        _ = token.cancelled() => {
                            finish(uploader.id(), operation, Err(UploadError::Cancelled))
                        }
                    },
                    None => upload.await,
                }
            });
            slots.insert(handle.id(), index);
        }

        let mut outcomes: Vec<Option<UploadResult>> = vec![None; self.uploaders.len()];
        while let Some(joined) = tasks.join_next_with_id().await {
            let (task_id, result) = match joined {
                Ok((task_id, result)) => (task_id, result),
                Err(err) => {
                    let message = format!("backend task failed: {err}");
                    (err.id(), UploadResult::failure(ErrorKind::Backend, message))
                }
            };
            if let Some(&index) = slots.get(&task_id) {
                outcomes[index] = Some(result);
            }
        }

        let results = self
            .uploaders
            .iter()
            .zip(outcomes)
            .map(|(uploader, outcome)| {
                let result = outcome.unwrap_or_else(|| {
                    UploadResult::failure(ErrorKind::Backend, "backend task vanished")
                });
                (uploader.id().to_string(), result)
            })
            .collect();

        let aggregate = AggregateUploadResult::from_results(results);
        info!(
            operation,
            succeeded = aggregate.succeeded(),
            total = aggregate.results.len(),
            cid = %aggregate.cid,
            "fan-out upload finished"
        );
        for (id, cid) in aggregate.divergent_cids() {
            warn!(backend = id, %cid, "backend reported a different CID");
        }
        aggregate
    }
}
