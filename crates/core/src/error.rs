//! Error types for the core domain.

use std::path::PathBuf;
use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("no files found: {0}")]
    NoFiles(String),

    #[error("invalid CID: {0}")]
    InvalidCid(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
