//! Adapter for S3-compatible object stores.
//!
//! The store has no notion of content addressing, so uploads are packed into
//! a CAR archive locally. The archive is stored under the caller's name or
//! its root CID, stamped with the root, and the root is read back from the
//! object's metadata before it is reported.

use crate::error::UploadError;
use crate::uploader::Uploader;
use async_trait::async_trait;
use bytes::Bytes;
use cidfan_core::car::pack;
use cidfan_core::config::{EncoderConfig, ObjectStoreVendor};
use cidfan_core::input::{DirectoryEntry, FsAccess, ResolvedDirectory};
use cidfan_storage::{ObjectStore, PutOptions};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Metadata keys checked, in order, for the CID of a stored object.
pub const CID_METADATA_KEYS: [&str; 4] = ["cid", "ipfs-hash", "x-amz-meta-cid", "x-amz-meta-ipfs-hash"];

pub const CAR_CONTENT_TYPE: &str = "application/vnd.ipld.car";

pub struct ObjectStoreUploader {
    id: String,
    store: Arc<dyn ObjectStore>,
    vendor: ObjectStoreVendor,
    encoder: EncoderConfig,
    fs_access: FsAccess,
    http: reqwest::Client,
}

impl std::fmt::Debug for ObjectStoreUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreUploader")
            .field("id", &self.id)
            .field("store", &self.store.backend_name())
            .field("vendor", &self.vendor)
            .finish_non_exhaustive()
    }
}

impl ObjectStoreUploader {
    pub fn new(
        id: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        vendor: ObjectStoreVendor,
        http: reqwest::Client,
    ) -> Self {
        Self {
            id: id.into(),
            store,
            vendor,
            encoder: EncoderConfig::default(),
            fs_access: FsAccess::default(),
            http,
        }
    }

    pub fn with_encoder(mut self, encoder: EncoderConfig) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_fs_access(mut self, fs_access: FsAccess) -> Self {
        self.fs_access = fs_access;
        self
    }

    /// Pack `entries`, store the archive and confirm its root.
    async fn upload_car(
        &self,
        key: Option<String>,
        entries: Vec<DirectoryEntry>,
    ) -> Result<String, UploadError> {
        if !self.vendor.supports_car_import() {
            return Err(UploadError::Unsupported {
                vendor: self.vendor.to_string(),
                operation: "CAR import",
            });
        }

        let archive = pack(entries, self.encoder).await?;
        let root = archive.root.to_string();
        let key = key.unwrap_or_else(|| root.clone());
        debug!(%root, key = %key, size = archive.bytes.len(), "archive packed");

        let options = PutOptions::default()
            .content_type(CAR_CONTENT_TYPE)
            .metadata("import", "car")
            .metadata("cid", root.clone());
        self.store.put(&key, archive.bytes, options).await?;

        let reported = self.read_cid(&key).await?;
        if reported != root {
            return Err(UploadError::CidMismatch {
                expected: root,
                actual: reported,
            });
        }
        Ok(root)
    }

    /// The CID recorded in the metadata of `key`.
    pub async fn read_cid(&self, key: &str) -> Result<String, UploadError> {
        let meta = self.store.head(key).await?;
        CID_METADATA_KEYS
            .iter()
            .find_map(|k| meta.metadata_value(k))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| UploadError::CidNotFoundInMetadata {
                key: key.to_string(),
            })
    }
}

#[async_trait]
impl Uploader for ObjectStoreUploader {
    fn id(&self) -> &str {
        &self.id
    }

    fn fs_access(&self) -> FsAccess {
        self.fs_access
    }

    fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    #[instrument(skip(self), fields(backend = %self.id, store = self.store.backend_name()))]
    async fn health_check(&self) -> Result<(), UploadError> {
        self.store.health_check().await?;
        Ok(())
    }

    #[instrument(skip(self, data), fields(backend = %self.id, vendor = %self.vendor, size = data.len()))]
    async fn put_file(&self, name: &str, data: Bytes) -> Result<String, UploadError> {
        if self.vendor.supports_car_import() {
            return self
                .upload_car(None, vec![DirectoryEntry::new(name, data)])
                .await;
        }

        // Vendors without archive import pin the raw object and report its CID.
        self.store.put(name, data, PutOptions::default()).await?;
        self.read_cid(name).await
    }

    #[instrument(
        skip(self, directory),
        fields(
            backend = %self.id,
            vendor = %self.vendor,
            files = directory.entries.len(),
            size = directory.total_size(),
        )
    )]
    async fn put_directory(&self, directory: ResolvedDirectory) -> Result<String, UploadError> {
        if !self.vendor.supports_car_import() {
            return Err(UploadError::Unsupported {
                vendor: self.vendor.to_string(),
                operation: "directory upload",
            });
        }
        self.upload_car(directory.name, directory.entries).await
    }
}
