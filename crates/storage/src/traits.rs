//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;

/// User metadata attached to an object, keyed by lowercase name.
pub type Metadata = BTreeMap<String, String>;

/// Options for a single put.
#[derive(Clone, Debug, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub metadata: Metadata,
}

impl PutOptions {
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .insert(key.into().to_ascii_lowercase(), value.into());
        self
    }
}

/// Metadata about a stored object.
#[derive(Clone, Debug, Default)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time (if available).
    pub last_modified: Option<time::OffsetDateTime>,
    /// Content type (if available).
    pub content_type: Option<String>,
    /// User metadata as reported by the store.
    pub metadata: Metadata,
}

impl ObjectMeta {
    /// Look up a metadata value, ignoring key case.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Object store abstraction for archive uploads.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Size and metadata of an object; `NotFound` when it is absent.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Put an object atomically, replacing any previous object and metadata.
    async fn put(&self, key: &str, data: Bytes, options: PutOptions) -> StorageResult<()>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Static identifier for the backend type ("s3", "filesystem").
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable and writable.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
