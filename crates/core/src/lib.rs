//! Core domain types and shared logic for cidfan.
//!
//! This crate defines the data model used across all other crates:
//! - Upload inputs and their resolution into in-memory entries
//! - Per-backend and aggregate upload results
//! - CID computation, the UnixFS DAG builder and the CAR archive encoder
//! - The node `add` response line format
//! - Configuration

pub mod add_response;
pub mod car;
pub mod config;
pub mod error;
mod finite;
pub mod hash;
pub mod input;
pub mod result;
pub mod unixfs;
pub mod varint;

pub use add_response::{AddEntry, parse_add_line, parse_add_response};
pub use car::{ArchiveStream, PackedArchive, RootCid, encode_entries, pack, rewrite_root};
pub use cid::Cid;
pub use config::{AppConfig, BackendConfig, EncoderConfig, ObjectStoreVendor, StorageConfig};
pub use error::{Error, Result};
pub use hash::ContentHash;
pub use input::{
    DirectoryEntry, DirectoryInput, FileInput, FsAccess, ResolvedDirectory, UploadInput,
    canonical_json,
};
pub use result::{AggregateUploadResult, ErrorKind, UploadResult};
