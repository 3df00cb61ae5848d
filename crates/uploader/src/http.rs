//! HTTP helpers shared by the adapters.

use crate::error::UploadError;
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use reqwest::Url;
use reqwest::multipart::{Form, Part};
use tracing::debug;

/// Characters left alone by URI-component encoding.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// File name used when a URL has no usable last path segment.
pub const FALLBACK_DOWNLOAD_NAME: &str = "download";

/// Percent-encode a multipart file name as a URI component.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Parse and check an upload URL without touching the network.
pub fn validate_url(raw: &str) -> Result<Url, UploadError> {
    let url = Url::parse(raw.trim()).map_err(|e| UploadError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(url),
        "http" | "https" => Err(UploadError::InvalidUrl(format!("{raw}: missing host"))),
        other => Err(UploadError::InvalidUrl(format!(
            "{raw}: unsupported scheme {other}"
        ))),
    }
}

/// Last non-empty path segment of `url`, decoded, or [`FALLBACK_DOWNLOAD_NAME`].
pub fn file_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .filter(|s| !s.is_empty() && s != "." && s != ".." && !s.contains('/'))
        .unwrap_or_else(|| FALLBACK_DOWNLOAD_NAME.to_string())
}

/// Fail with the status and body when the response is not 2xx.
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UploadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UploadError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Download `url`, returning a file name for it and its body.
pub async fn fetch_url(client: &reqwest::Client, url: &Url) -> Result<(String, Bytes), UploadError> {
    let response = check_status(client.get(url.clone()).send().await?).await?;
    let body = response.bytes().await?;
    debug!(url = %url, size = body.len(), "downloaded upload source");
    Ok((file_name_from_url(url), body))
}

/// Reject names that cannot be sent unescaped in a quoted `filename`.
pub fn check_raw_file_name(name: &str) -> Result<(), UploadError> {
    if name.chars().any(|c| c == '"' || c.is_control()) {
        return Err(cidfan_core::Error::InvalidPath(format!(
            "file name {name:?} contains a quote or control character"
        ))
        .into());
    }
    Ok(())
}

/// A multipart form whose file names are sent exactly as given.
pub fn raw_form() -> Form {
    Form::new().percent_encode_noop()
}

/// A file part sent under `file_name`, which callers encode as their API expects.
pub fn file_part(file_name: &str, data: &Bytes) -> Result<Part, UploadError> {
    Part::bytes(data.to_vec())
        .file_name(file_name.to_string())
        .mime_str("application/octet-stream")
        .map_err(UploadError::Transport)
}

/// An empty directory marker part, as the node RPC expects for nested paths.
pub fn directory_part(file_name: &str) -> Result<Part, UploadError> {
    Part::bytes(Vec::new())
        .file_name(file_name.to_string())
        .mime_str("application/x-directory")
        .map_err(UploadError::Transport)
}
