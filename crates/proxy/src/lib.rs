//! Streaming pin extraction for proxied node `add` responses.
//!
//! [`PinExtractor`] sits in a proxy's response path, forwarding the node's
//! NDJSON body unchanged while it works out which CIDs are upload roots.
//! Those are handed to a [`PinSink`] such as [`HttpPinRegistrar`] after the
//! body has been delivered.

pub mod error;
pub mod extractor;
pub mod pin_client;

pub use error::{ProxyError, Result};
pub use extractor::{
    LineParser, PinCandidate, PinExtractor, extract_pin_candidates, select_pin_candidates,
    wrap_with_directory_from_url,
};
pub use pin_client::{HttpPinRegistrar, PinSink};
