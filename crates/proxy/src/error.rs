//! Proxy error types.

use thiserror::Error;

/// Failure of the out-of-band pin registration.
///
/// Never surfaced on the proxied response; callers log it.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid pin endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("pin registration returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("pin registration failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
