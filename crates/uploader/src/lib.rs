//! Upload adapters and fan-out for cidfan.
//!
//! This crate provides:
//! - The [`Uploader`] capability set (file, text, JSON, directory, URL)
//! - Adapters for node RPC, pinning services and object stores
//! - [`FanoutUploader`], which sends one upload to every backend

pub mod backend;
pub mod error;
pub mod fanout;
pub mod http;
pub mod node;
pub mod object_store;
pub mod pinning;
pub mod uploader;

pub use backend::{Backend, backends_from_config};
pub use error::{UploadError, UsageError};
pub use fanout::FanoutUploader;
pub use node::NodeUploader;
pub use object_store::ObjectStoreUploader;
pub use pinning::{PinningAuth, PinningUploader};
pub use uploader::{JSON_FILE_NAME, TEXT_FILE_NAME, Uploader};
