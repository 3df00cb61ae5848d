//! Adapter for a content-addressed node's RPC `add` endpoint.

use crate::error::UploadError;
use crate::http::{check_status, directory_part, encode_component, file_part, raw_form};
use crate::uploader::Uploader;
use async_trait::async_trait;
use bytes::Bytes;
use cidfan_core::add_response::{AddEntry, parse_add_response};
use cidfan_core::input::{FsAccess, ResolvedDirectory};
use reqwest::Url;
use tracing::{debug, instrument};

/// Uploads through `POST /api/v0/add`, always requesting CIDv1.
#[derive(Clone, Debug)]
pub struct NodeUploader {
    id: String,
    endpoint: Url,
    auth_token: Option<String>,
    pin: bool,
    fs_access: FsAccess,
    http: reqwest::Client,
}

impl NodeUploader {
    pub fn new(
        id: impl Into<String>,
        endpoint: &str,
        http: reqwest::Client,
    ) -> Result<Self, UploadError> {
        let mut endpoint = crate::http::validate_url(endpoint)?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Ok(Self {
            id: id.into(),
            endpoint,
            auth_token: None,
            pin: true,
            fs_access: FsAccess::default(),
            http,
        })
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn with_pin(mut self, pin: bool) -> Self {
        self.pin = pin;
        self
    }

    pub fn with_fs_access(mut self, fs_access: FsAccess) -> Self {
        self.fs_access = fs_access;
        self
    }

    fn add_url(&self, wrap_with_directory: bool) -> Result<Url, UploadError> {
        let mut url = self
            .endpoint
            .join("api/v0/add")
            .map_err(|e| UploadError::InvalidUrl(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("cid-version", "1")
                .append_pair("pin", if self.pin { "true" } else { "false" });
            if wrap_with_directory {
                query.append_pair("wrap-with-directory", "true");
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn add(
        &self,
        form: reqwest::multipart::Form,
        wrap_with_directory: bool,
    ) -> Result<Vec<AddEntry>, UploadError> {
        let request = self
            .http
            .post(self.add_url(wrap_with_directory)?)
            .multipart(form);
        let response = check_status(self.authorize(request).send().await?).await?;
        let body = response.text().await?;
        let entries: Vec<AddEntry> = parse_add_response(&body)
            .map_err(|e| UploadError::UnexpectedResponse(e.to_string()))?
            .into_iter()
            .filter(AddEntry::is_pin_candidate)
            .collect();
        if entries.is_empty() {
            return Err(UploadError::NoFilesProcessed);
        }
        Ok(entries)
    }
}

/// The wrapping root is the entry with an empty name, else the last entry.
fn select_root(entries: &[AddEntry]) -> Option<&AddEntry> {
    entries
        .iter()
        .find(|e| e.name.is_empty())
        .or_else(|| entries.last())
}

#[async_trait]
impl Uploader for NodeUploader {
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
            .endpoint
            .join("api/v0/version")
            .map_err(|e| UploadError::InvalidUrl(e.to_string()))?;
        let response = check_status(self.authorize(self.http.post(url)).send().await?).await?;
        let body = response.text().await?;
        debug!(version = body.trim(), "node reachable");
        Ok(())
    }

    #[instrument(skip(self, data), fields(backend = %self.id, size = data.len()))]
    async fn put_file(&self, name: &str, data: Bytes) -> Result<String, UploadError> {
        let form = raw_form().part("file", file_part(&encode_component(name), &data)?);
        let entries = self.add(form, false).await?;
        entries
            .last()
            .and_then(|e| e.hash.clone())
            .ok_or(UploadError::NoFilesProcessed)
    }

    #[instrument(skip(self, directory), fields(backend = %self.id, files = directory.entries.len()))]
    async fn put_directory(&self, directory: ResolvedDirectory) -> Result<String, UploadError> {
        if directory.entries.is_empty() {
            return Err(cidfan_core::Error::NoFiles("directory has no entries".to_string()).into());
        }

        let mut form = raw_form();
        for dir in directory.directories() {
            form = form.part("file", directory_part(&encode_component(&dir))?);
        }
        for entry in &directory.entries {
            form = form.part(
                "file",
                file_part(&encode_component(&entry.path), &entry.content)?,
            );
        }

        let entries = self.add(form, true).await?;
        debug!(entries = entries.len(), "node add returned");
        select_root(&entries)
            .and_then(|e| e.hash.clone())
            .ok_or(UploadError::NoFilesProcessed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cidfan_core::add_response::parse_add_line;

    #[test]
    fn test_add_url_query() {
        let node = NodeUploader::new("n", "http://127.0.0.1:5001", reqwest::Client::new()).unwrap();
        assert_eq!(
            node.add_url(true).unwrap().as_str(),
            "http://127.0.0.1:5001/api/v0/add?cid-version=1&pin=true&wrap-with-directory=true"
        );
        let unpinned = node.with_pin(false);
        assert_eq!(
            unpinned.add_url(false).unwrap().as_str(),
            "http://127.0.0.1:5001/api/v0/add?cid-version=1&pin=false"
        );
    }

    #[test]
    fn test_select_root_prefers_unnamed_entry() {
        let entries = vec![
            parse_add_line(r#"{"Name":"a.txt","Hash":"A","Size":"1"}"#).unwrap(),
            parse_add_line(r#"{"Name":"","Hash":"ROOT","Size":"9"}"#).unwrap(),
            parse_add_line(r#"{"Name":"dir","Hash":"D","Size":"5"}"#).unwrap(),
        ];
        assert_eq!(select_root(&entries).unwrap().hash.as_deref(), Some("ROOT"));
        assert_eq!(select_root(&entries[2..]).unwrap().hash.as_deref(), Some("D"));
    }

    #[test]
    fn test_add_url_keeps_endpoint_path() {
        let node = NodeUploader::new("n", "https://gateway.example/rpc", reqwest::Client::new()).unwrap();
        assert_eq!(
            node.add_url(false).unwrap().as_str(),
            "https://gateway.example/rpc/api/v0/add?cid-version=1&pin=true"
        );
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        assert!(NodeUploader::new("n", "localhost:5001/x y", reqwest::Client::new()).is_err());
    }
}
