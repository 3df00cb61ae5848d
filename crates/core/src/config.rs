//! Configuration types shared across crates.

use crate::input::FsAccess;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use url::Url;

/// Default leaf size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Smallest accepted leaf size: 1 KiB.
pub const MIN_CHUNK_SIZE: usize = 1024;

/// Largest accepted leaf size: 4 MiB.
pub const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Default fan-out of interior file nodes.
pub const DEFAULT_MAX_LINKS: usize = 1024;

/// CID encoder configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Leaf size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Maximum children per interior file node.
    #[serde(default = "default_max_links")]
    pub max_links: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_links() -> usize {
    DEFAULT_MAX_LINKS
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_links: default_max_links(),
        }
    }
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(format!(
                "encoder.chunk_size {} must be between {} and {} bytes",
                self.chunk_size, MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
            ));
        }
        if self.max_links < 2 {
            return Err(format!(
                "encoder.max_links {} must be at least 2",
                self.max_links
            ));
        }
        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, Filebase, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// Falls back to AWS_ACCESS_KEY_ID if not set.
        access_key_id: Option<String>,
        /// Falls back to AWS_SECRET_ACCESS_KEY if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/objects"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.is_empty() {
                    return Err("s3 config requires a bucket".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }

    /// Default backend identity: the endpoint host, the regional AWS host, or
    /// `local` for the filesystem store.
    pub fn default_id(&self) -> String {
        match self {
            StorageConfig::Filesystem { .. } => "local".to_string(),
            StorageConfig::S3 {
                endpoint, region, ..
            } => endpoint
                .as_deref()
                .and_then(host_of)
                .unwrap_or_else(|| {
                    format!(
                        "s3.{}.amazonaws.com",
                        region.as_deref().unwrap_or("us-east-1")
                    )
                }),
        }
    }
}

/// Object store vendors with distinct archive handling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreVendor {
    /// Imports uploaded archives and reports the CID as `cid` metadata.
    Filebase,
    /// Pins raw objects and reports the CID as `ipfs-hash` metadata. No archive import.
    Foreverland,
    /// Any S3-compatible store. The adapter stamps the CID itself.
    #[default]
    Generic,
}

impl ObjectStoreVendor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filebase => "filebase",
            Self::Foreverland => "foreverland",
            Self::Generic => "generic",
        }
    }

    pub fn supports_car_import(self) -> bool {
        !matches!(self, Self::Foreverland)
    }

    /// The vendor computes the CID and writes it into object metadata.
    pub fn assigns_cid(self) -> bool {
        !matches!(self, Self::Generic)
    }
}

impl std::fmt::Display for ObjectStoreVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upload backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// A content-addressed node reachable over its RPC API.
    Node {
        id: Option<String>,
        /// RPC base URL, e.g. `http://127.0.0.1:5001`.
        endpoint: String,
        /// Sent as a bearer token.
        auth_token: Option<String>,
        #[serde(default = "default_true")]
        pin: bool,
    },
    /// A hosted pinning service.
    Pinning {
        id: Option<String>,
        #[serde(default = "default_pinning_api_url")]
        api_url: String,
        jwt: Option<String>,
        api_key: Option<String>,
        api_secret: Option<String>,
        /// Name of the synthetic directory wrapping directory uploads.
        #[serde(default = "default_directory_name")]
        directory_name: String,
    },
    /// An S3-compatible store, or a local directory when `path` is set.
    ObjectStore {
        id: Option<String>,
        #[serde(default)]
        vendor: ObjectStoreVendor,
        bucket: Option<String>,
        endpoint: Option<String>,
        region: Option<String>,
        prefix: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        #[serde(default)]
        force_path_style: bool,
        path: Option<PathBuf>,
    },
}

fn default_true() -> bool {
    true
}

fn default_pinning_api_url() -> String {
    "https://api.pinata.cloud".to_string()
}

fn default_directory_name() -> String {
    "upload".to_string()
}

impl BackendConfig {
    /// Backend kind as written in configuration.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Node { .. } => "node",
            Self::Pinning { .. } => "pinning",
            Self::ObjectStore { .. } => "object_store",
        }
    }

    /// The explicit identifier, if configured.
    pub fn explicit_id(&self) -> Option<&str> {
        match self {
            Self::Node { id, .. } | Self::Pinning { id, .. } | Self::ObjectStore { id, .. } => {
                id.as_deref()
            }
        }
    }

    /// The identifier the backend will be registered under.
    pub fn resolved_id(&self) -> Result<String, String> {
        if let Some(id) = self.explicit_id() {
            return Ok(id.to_string());
        }
        match self {
            Self::Node { endpoint, .. } => {
                host_of(endpoint).ok_or_else(|| format!("node endpoint {endpoint:?} has no host"))
            }
            Self::Pinning { api_url, .. } => {
                host_of(api_url).ok_or_else(|| format!("pinning api_url {api_url:?} has no host"))
            }
            Self::ObjectStore { .. } => Ok(self.store_config()?.default_id()),
        }
    }

    /// Storage configuration for an object-store backend.
    pub fn store_config(&self) -> Result<StorageConfig, String> {
        match self {
            Self::ObjectStore {
                bucket,
                endpoint,
                region,
                prefix,
                access_key_id,
                secret_access_key,
                force_path_style,
                path,
                ..
            } => match (path, bucket) {
                (Some(path), None) => Ok(StorageConfig::Filesystem { path: path.clone() }),
                (None, Some(bucket)) => Ok(StorageConfig::S3 {
                    bucket: bucket.clone(),
                    endpoint: endpoint.clone(),
                    region: region.clone(),
                    prefix: prefix.clone(),
                    access_key_id: access_key_id.clone(),
                    secret_access_key: secret_access_key.clone(),
                    force_path_style: *force_path_style,
                }),
                (Some(_), Some(_)) => {
                    Err("object_store config takes either 'path' or 'bucket', not both".to_string())
                }
                (None, None) => Err("object_store config requires 'bucket' or 'path'".to_string()),
            },
            other => Err(format!("{} backend has no object store", other.kind())),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Node { endpoint, .. } => check_http_url("node endpoint", endpoint),
            Self::Pinning {
                api_url,
                jwt,
                api_key,
                api_secret,
                directory_name,
                ..
            } => {
                check_http_url("pinning api_url", api_url)?;
                if directory_name.is_empty() || directory_name.contains('/') {
                    return Err(format!(
                        "pinning directory_name {directory_name:?} must be a single non-empty segment"
                    ));
                }
                match (jwt.is_some(), api_key.is_some(), api_secret.is_some()) {
                    (true, false, false) | (false, true, true) => Ok(()),
                    (false, false, false) => Err(
                        "pinning config requires either 'jwt' or 'api_key' + 'api_secret'".to_string(),
                    ),
                    (true, _, _) => Err(
                        "pinning config takes either 'jwt' or 'api_key' + 'api_secret', not both"
                            .to_string(),
                    ),
                    _ => Err(
                        "pinning config requires both api_key and api_secret when either is set"
                            .to_string(),
                    ),
                }
            }
            Self::ObjectStore { vendor, .. } => {
                let store = self.store_config()?;
                if *vendor != ObjectStoreVendor::Generic
                    && matches!(store, StorageConfig::Filesystem { .. })
                {
                    return Err(format!(
                        "object_store vendor {vendor} requires an S3 bucket, not a local path"
                    ));
                }
                store.validate()
            }
        }
    }
}

/// Pin registration settings used by the proxy.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Endpoint receiving `{apiKey, pins}`.
    pub pin_endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl ProxyConfig {
    pub fn validate(&self) -> Result<(), String> {
        match (&self.pin_endpoint, &self.api_key) {
            (Some(endpoint), Some(_)) => check_http_url("proxy pin_endpoint", endpoint),
            (None, None) => Ok(()),
            _ => Err("proxy config requires both pin_endpoint and api_key when either is set".to_string()),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backends in registration order.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    #[serde(default)]
    pub encoder: EncoderConfig,
    /// Whether path inputs may be read from the local filesystem.
    #[serde(default = "default_true")]
    pub filesystem_access: bool,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            encoder: EncoderConfig::default(),
            filesystem_access: true,
            proxy: ProxyConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn fs_access(&self) -> FsAccess {
        FsAccess::from_flag(self.filesystem_access)
    }

    /// Validate every section, and that backend identifiers are unique.
    pub fn validate(&self) -> Result<(), String> {
        self.encoder.validate()?;
        self.proxy.validate()?;

        let mut ids = HashSet::new();
        for (index, backend) in self.backends.iter().enumerate() {
            backend
                .validate()
                .map_err(|e| format!("backends[{index}]: {e}"))?;
            let id = backend
                .resolved_id()
                .map_err(|e| format!("backends[{index}]: {e}"))?;
            if !ids.insert(id.clone()) {
                return Err(format!(
                    "backends[{index}]: duplicate backend id {id:?}; set an explicit 'id'"
                ));
            }
        }
        Ok(())
    }
}

fn check_http_url(what: &str, value: &str) -> Result<(), String> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => Ok(()),
        _ => Err(format!("{what} {value:?} must be an http(s) URL")),
    }
}

/// Host, plus a non-default port, of an endpoint URL.
///
/// Bare `host:port` endpoints are read as `http://host:port`. Hosts come back
/// lowercased, so endpoints differing only in case share an identity.
pub fn host_of(endpoint: &str) -> Option<String> {
    let url = if endpoint.contains("://") {
        Url::parse(endpoint)
    } else {
        Url::parse(&format!("http://{endpoint}"))
    }
    .ok()?;
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
