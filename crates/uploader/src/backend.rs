//! Tagged backend variant and construction from configuration.

use crate::error::{UploadError, UsageError};
use crate::node::NodeUploader;
use crate::object_store::ObjectStoreUploader;
use crate::pinning::{PinningAuth, PinningUploader};
use crate::uploader::Uploader;
use async_trait::async_trait;
use bytes::Bytes;
use cidfan_core::config::{AppConfig, BackendConfig, EncoderConfig};
use cidfan_core::input::{FsAccess, ResolvedDirectory};
use std::sync::Arc;
use tracing::info;

/// One configured backend.
#[derive(Debug)]
pub enum Backend {
    Node(NodeUploader),
    Pinning(PinningUploader),
    ObjectStore(ObjectStoreUploader),
}

impl Backend {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Node(_) => "node",
            Self::Pinning(_) => "pinning",
            Self::ObjectStore(_) => "object_store",
        }
    }

    fn inner(&self) -> &dyn Uploader {
        match self {
            Self::Node(u) => u,
            Self::Pinning(u) => u,
            Self::ObjectStore(u) => u,
        }
    }

    /// Build a backend from its configuration.
    pub async fn from_config(
        config: &BackendConfig,
        encoder: EncoderConfig,
        fs_access: FsAccess,
        http: reqwest::Client,
    ) -> Result<Self, UsageError> {
        config.validate().map_err(UsageError::Config)?;
        let id = config.resolved_id().map_err(UsageError::Config)?;

        let backend = match config {
            BackendConfig::Node {
                endpoint,
                auth_token,
                pin,
                ..
            } => Self::Node(
                NodeUploader::new(id, endpoint, http)
                    .map_err(config_error)?
                    .with_auth_token(auth_token.clone())
                    .with_pin(*pin)
                    .with_fs_access(fs_access),
            ),
            BackendConfig::Pinning {
                api_url,
                jwt,
                api_key,
                api_secret,
                directory_name,
                ..
            } => {
                let auth = match (jwt, api_key, api_secret) {
                    (Some(jwt), _, _) => PinningAuth::Jwt(jwt.clone()),
                    (None, Some(key), Some(secret)) => PinningAuth::ApiKey {
                        key: key.clone(),
                        secret: secret.clone(),
                    },
                    _ => {
                        return Err(UsageError::Config(
                            "pinning backend has no credentials".to_string(),
                        ));
                    }
                };
                Self::Pinning(
                    PinningUploader::new(id, api_url, auth, http)
                        .map_err(config_error)?
                        .with_directory_name(directory_name.clone())
                        .with_fs_access(fs_access),
                )
            }
            BackendConfig::ObjectStore { vendor, .. } => {
                let store_config = config.store_config().map_err(UsageError::Config)?;
                let store = cidfan_storage::from_config(&store_config)
                    .await
                    .map_err(|e| UsageError::Config(e.to_string()))?;
                Self::ObjectStore(
                    ObjectStoreUploader::new(id, store, *vendor, http)
                        .with_encoder(encoder)
                        .with_fs_access(fs_access),
                )
            }
        };

        info!(backend = backend.id(), kind = backend.kind(), "backend configured");
        Ok(backend)
    }
}

fn config_error(err: UploadError) -> UsageError {
    UsageError::Config(err.to_string())
}

/// Build every configured backend, in configuration order.
pub async fn backends_from_config(config: &AppConfig) -> Result<Vec<Arc<dyn Uploader>>, UsageError> {
    config.encoder.validate().map_err(UsageError::Config)?;
    let http = reqwest::Client::builder()
        .user_agent(concat!("cidfan/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| UsageError::Config(format!("failed to build HTTP client: {e}")))?;

    let mut backends: Vec<Arc<dyn Uploader>> = Vec::with_capacity(config.backends.len());
    for backend in &config.backends {
        let built = Backend::from_config(backend, config.encoder, config.fs_access(), http.clone()).await?;
        backends.push(Arc::new(built));
    }
    Ok(backends)
}

#[async_trait]
impl Uploader for Backend {
    fn id(&self) -> &str {
        self.inner().id()
    }

    fn fs_access(&self) -> FsAccess {
        self.inner().fs_access()
    }

    fn http_client(&self) -> &reqwest::Client {
        self.inner().http_client()
    }

    async fn put_file(&self, name: &str, data: Bytes) -> Result<String, UploadError> {
        self.inner().put_file(name, data).await
    }

    async fn put_directory(&self, directory: ResolvedDirectory) -> Result<String, UploadError> {
        self.inner().put_directory(directory).await
    }

    async fn health_check(&self) -> Result<(), UploadError> {
        self.inner().health_check().await
    }
}
