//! Adapter for a hosted pinning service (`pinFileToIPFS`).
//!
//! The service has no directory primitive: a directory becomes one multipart
//! request whose files all sit under a synthetic directory name, and the CID
//! reported for that directory is the result.

use crate::error::UploadError;
use crate::http::{check_raw_file_name, check_status, file_part, raw_form};
use crate::uploader::Uploader;
use async_trait::async_trait;
use bytes::Bytes;
use cidfan_core::input::{FsAccess, ResolvedDirectory};
use reqwest::Url;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

/// Credentials accepted by the pinning API.
#[derive(Clone)]
pub enum PinningAuth {
    Jwt(String),
    ApiKey { key: String, secret: String },
}

impl std::fmt::Debug for PinningAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jwt(_) => f.write_str("Jwt(<redacted>)"),
            Self::ApiKey { .. } => f.write_str("ApiKey(<redacted>)"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

#[derive(Clone, Debug)]
pub struct PinningUploader {
    id: String,
    api_url: Url,
    auth: PinningAuth,
    directory_name: String,
    fs_access: FsAccess,
    http: reqwest::Client,
}

impl PinningUploader {
    pub fn new(
        id: impl Into<String>,
        api_url: &str,
        auth: PinningAuth,
        http: reqwest::Client,
    ) -> Result<Self, UploadError> {
        let mut api_url = crate::http::validate_url(api_url)?;
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }
        Ok(Self {
            id: id.into(),
            api_url,
            auth,
            directory_name: "upload".to_string(),
            fs_access: FsAccess::default(),
            http,
        })
    }

    /// Name of the synthetic directory used when a directory upload has none.
    pub fn with_directory_name(mut self, name: impl Into<String>) -> Self {
        self.directory_name = name.into();
        self
    }

    pub fn with_fs_access(mut self, fs_access: FsAccess) -> Self {
        self.fs_access = fs_access;
        self
    }

    fn with_options(form: Form, name: &str) -> Result<Form, UploadError> {
        let options = Part::text(json!({ "cidVersion": 1 }).to_string())
            .mime_str("application/json")
            .map_err(UploadError::Transport)?;
        let metadata = Part::text(json!({ "name": name }).to_string())
            .mime_str("application/json")
            .map_err(UploadError::Transport)?;
        Ok(form
            .part("pinataOptions", options)
            .part("pinataMetadata", metadata))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            PinningAuth::Jwt(token) => request.bearer_auth(token),
            PinningAuth::ApiKey { key, secret } => request
                .header("pinata_api_key", key)
                .header("pinata_secret_api_key", secret),
        }
    }

    async fn pin(&self, form: Form) -> Result<String, UploadError> {
        let url = self
            .api_url
            .join("pinning/pinFileToIPFS")
            .map_err(|e| UploadError::InvalidUrl(e.to_string()))?;
        let request = self.authorize(self.http.post(url).multipart(form));
        let response = check_status(request.send().await?).await?;
        let body = response.text().await?;
        let parsed: PinResponse = serde_json::from_str(&body)
            .map_err(|e| UploadError::UnexpectedResponse(format!("{e}: {body}")))?;
        if parsed.ipfs_hash.is_empty() {
            return Err(UploadError::UnexpectedResponse("empty IpfsHash".to_string()));
        }
        Ok(parsed.ipfs_hash)
    }
}

/// Multipart body for a directory: every file under `root_name/`.
///
/// Built only from resolved entries, so in-memory and filesystem sources
/// produce identical payloads.
pub fn directory_form(root_name: &str, directory: &ResolvedDirectory) -> Result<Form, UploadError> {
    let mut form = raw_form();
    for entry in &directory.entries {
        let file_name = format!("{root_name}/{}", entry.path);
        check_raw_file_name(&file_name)?;
        form = form.part("file", file_part(&file_name, &entry.content)?);
    }
    Ok(form)
}

#[async_trait]
impl Uploader for PinningUploader {
    fn id(&self) -> &str {
        &self.id
    }

    fn fs_access(&self) -> FsAccess {
        self.fs_access
    }

    fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    #[instrument(skip(self), fields(backend = %self.id))]
    async fn health_check(&self) -> Result<(), UploadError> {
        let url = self
            .api_url
            .join("data/testAuthentication")
            .map_err(|e| UploadError::InvalidUrl(e.to_string()))?;
        check_status(self.authorize(self.http.get(url)).send().await?).await?;
        Ok(())
    }

    #[instrument(skip(self, data), fields(backend = %self.id, size = data.len()))]
    async fn put_file(&self, name: &str, data: Bytes) -> Result<String, UploadError> {
        check_raw_file_name(name)?;
        let form = raw_form().part("file", file_part(name, &data)?);
        self.pin(Self::with_options(form, name)?).await
    }

    #[instrument(skip(self, directory), fields(backend = %self.id, files = directory.entries.len()))]
    async fn put_directory(&self, directory: ResolvedDirectory) -> Result<String, UploadError> {
        if directory.entries.is_empty() {
            return Err(cidfan_core::Error::NoFiles("directory has no entries".to_string()).into());
        }
        let root_name = directory
            .name
            .clone()
            .filter(|n| !n.is_empty() && !n.contains('/'))
            .unwrap_or_else(|| self.directory_name.clone());
        let form = directory_form(&root_name, &directory)?;
        self.pin(Self::with_options(form, &root_name)?).await
    }
}
