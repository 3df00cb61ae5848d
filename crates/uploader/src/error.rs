//! Upload error types.

use cidfan_core::ErrorKind;
use cidfan_storage::StorageError;
use thiserror::Error;

/// A failed upload against one backend.
///
/// These never escape the capability set as `Err`; they are folded into
/// [`cidfan_core::UploadResult`] with their [`ErrorKind`].
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Input(#[from] cidfan_core::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("no files processed")]
    NoFilesProcessed,

    #[error("{vendor} does not support {operation}")]
    Unsupported {
        vendor: String,
        operation: &'static str,
    },

    #[error("CID not found in metadata of object {key}")]
    CidNotFoundInMetadata { key: String },

    #[error("CID mismatch: computed {expected}, store reported {actual}")]
    CidMismatch { expected: String, actual: String },

    #[error("upload cancelled")]
    Cancelled,
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input(_) | Self::InvalidUrl(_) => ErrorKind::Input,
            Self::Http { status, .. } if *status >= 500 || *status == 429 => ErrorKind::Transport,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Storage(e) if e.is_transport() => ErrorKind::Transport,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Http { .. }
            | Self::Storage(_)
            | Self::UnexpectedResponse(_)
            | Self::NoFilesProcessed
            | Self::Unsupported { .. }
            | Self::CidNotFoundInMetadata { .. }
            | Self::CidMismatch { .. } => ErrorKind::Backend,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn is_path_not_found(&self) -> bool {
        matches!(self, Self::Input(cidfan_core::Error::PathNotFound(_)))
    }
}

/// Misuse of the uploader API, reported immediately rather than as a result.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("at least one uploader is required")]
    NoUploaders,

    #[error("duplicate uploader id: {0}")]
    DuplicateUploader(String),

    #[error("filesystem access is not available for {0}")]
    FilesystemUnavailable(String),

    #[error("invalid backend configuration: {0}")]
    Config(String),
}
