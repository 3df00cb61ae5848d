//! Object stores that receive packed archives and report the CID a gateway
//! assigned to them.
//!
//! Two stores are provided: a local directory and any S3-compatible bucket.
//! Both keep user metadata next to each object so a put can carry the
//! archive's root and a head can read back what the provider computed.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, s3::S3Backend};
pub use error::{StorageError, StorageResult};
pub use traits::{Metadata, ObjectMeta, ObjectStore, PutOptions};

use cidfan_core::config::StorageConfig;
use std::sync::Arc;
use tracing::debug;

/// Build the store described by `config`.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    let store: Arc<dyn ObjectStore> = match config {
        StorageConfig::Filesystem { path } => Arc::new(FilesystemBackend::new(path).await?),
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => Arc::new(
            S3Backend::new(
                bucket,
                endpoint.clone(),
                region.clone(),
                prefix.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )
            .await?,
        ),
    };

    debug!(backend = store.backend_name(), id = %config.default_id(), "object store configured");
    Ok(store)
}
