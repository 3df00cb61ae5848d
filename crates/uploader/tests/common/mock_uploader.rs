//! In-process uploader with scripted outcomes.

use async_trait::async_trait;
use bytes::Bytes;
use cidfan_core::input::{FsAccess, ResolvedDirectory};
use cidfan_uploader::{UploadError, Uploader};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Clone, Debug)]
pub enum Behavior {
    Succeed(String),
    Fail { status: u16 },
    Delay(Duration, String),
    Hang,
}

pub struct MockUploader {
    id: String,
    behavior: Behavior,
    fs_access: FsAccess,
    http: reqwest::Client,
    calls: AtomicUsize,
    names: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockUploader {
    pub fn new(id: &str, behavior: Behavior) -> Self {
        Self {
            id: id.to_string(),
            behavior,
            fs_access: FsAccess::Enabled,
            http: reqwest::Client::new(),
            calls: AtomicUsize::new(0),
            names: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(id: &str, cid: &str) -> Self {
        Self::new(id, Behavior::Succeed(cid.to_string()))
    }

    pub fn with_fs_access(mut self, fs_access: FsAccess) -> Self {
        self.fs_access = fs_access;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// File names or directory paths seen, in call order.
    pub fn names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }

    async fn respond(&self) -> Result<String, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed(cid) => Ok(cid.clone()),
            Behavior::Fail { status } => Err(UploadError::Http {
                status: *status,
                body: format!("{} failed", self.id),
            }),
            Behavior::Delay(delay, cid) => {
                tokio::time::sleep(*delay).await;
                Ok(cid.clone())
            }
            Behavior::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl Uploader for MockUploader {
    fn id(&self) -> &str {
        &self.id
    }

    fn fs_access(&self) -> FsAccess {
        self.fs_access
    }

    fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    async fn health_check(&self) -> Result<(), UploadError> {
        match &self.behavior {
            Behavior::Fail { status } => Err(UploadError::Http {
                status: *status,
                body: format!("{} unhealthy", self.id),
            }),
            _ => Ok(()),
        }
    }

    async fn put_file(&self, name: &str, _data: Bytes) -> Result<String, UploadError> {
        self.names.lock().unwrap().push(name.to_string());
        self.respond().await
    }

    async fn put_directory(&self, directory: ResolvedDirectory) -> Result<String, UploadError> {
        self.names
            .lock()
            .unwrap()
            .extend(directory.entries.iter().map(|e| e.path.clone()));
        self.respond().await
    }
}
