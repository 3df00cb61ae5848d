//! Upload inputs and their resolution into in-memory entries.

use crate::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Glob pattern used when a directory path is given without one.
pub const DEFAULT_GLOB_PATTERN: &str = "**/*";

/// Whether the current runtime may read from the local filesystem.
///
/// Injected at construction so the same uploader code runs in sandboxed
/// environments, where path-based inputs are a usage error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsAccess {
    #[default]
    Enabled,
    Disabled,
}

impl FsAccess {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled { Self::Enabled } else { Self::Disabled }
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// One file of a directory upload. `path` uses `/` to denote nesting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub path: String,
    pub content: Bytes,
}

impl DirectoryEntry {
    pub fn new(path: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A single file to upload.
#[derive(Clone, Debug)]
pub enum FileInput {
    /// Named content already in memory.
    Memory { name: String, data: Bytes },
    /// A file on the local filesystem.
    Path(PathBuf),
}

impl FileInput {
    pub fn memory(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::Memory {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn requires_filesystem(&self) -> bool {
        matches!(self, Self::Path(_))
    }

    /// Read the file, returning its name and content.
    pub async fn load(self) -> Result<(String, Bytes)> {
        match self {
            Self::Memory { name, data } => Ok((name, data)),
            Self::Path(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;
                let data = tokio::fs::read(&path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        Error::PathNotFound(path.clone())
                    } else {
                        Error::Io(e)
                    }
                })?;
                Ok((name, Bytes::from(data)))
            }
        }
    }
}

/// A tree of files to upload.
#[derive(Clone, Debug)]
pub enum DirectoryInput {
    /// Named files supplied in memory.
    Files {
        name: Option<String>,
        files: Vec<DirectoryEntry>,
    },
    /// Files under `root` matching `pattern`.
    Path {
        name: Option<String>,
        root: PathBuf,
        pattern: String,
    },
}

impl DirectoryInput {
    pub fn files(files: Vec<DirectoryEntry>) -> Self {
        Self::Files { name: None, files }
    }

    pub fn path(root: impl Into<PathBuf>) -> Self {
        Self::Path {
            name: None,
            root: root.into(),
            pattern: DEFAULT_GLOB_PATTERN.to_string(),
        }
    }

    /// Replace the glob pattern of a path input. No effect on in-memory files.
    pub fn with_pattern(mut self, new_pattern: impl Into<String>) -> Self {
        if let Self::Path { pattern, .. } = &mut self {
            *pattern = new_pattern.into();
        }
        self
    }

    /// Name the upload. Backends use it as a directory or object name.
    pub fn with_name(mut self, new_name: impl Into<String>) -> Self {
        match &mut self {
            Self::Files { name, .. } | Self::Path { name, .. } => *name = Some(new_name.into()),
        }
        self
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Files { name, .. } | Self::Path { name, .. } => name.as_deref(),
        }
    }

    pub fn requires_filesystem(&self) -> bool {
        matches!(self, Self::Path { .. })
    }

    /// Collect the entries into memory, validating and normalising paths.
    ///
    /// Fails with [`Error::NoFiles`] when nothing matches and with
    /// [`Error::PathNotFound`] when a filesystem root does not exist.
    pub async fn resolve(self) -> Result<ResolvedDirectory> {
        match self {
            Self::Files { name, files } => {
                let entries = normalize_entries(files)?;
                if entries.is_empty() {
                    return Err(Error::NoFiles("no files provided".to_string()));
                }
                Ok(ResolvedDirectory { name, entries })
            }
            Self::Path {
                name,
                root,
                pattern,
            } => {
                let entries = tokio::task::spawn_blocking(move || collect_files(&root, &pattern))
                    .await
                    .map_err(|e| Error::Io(std::io::Error::other(format!("spawn_blocking failed: {e}"))))??;
                Ok(ResolvedDirectory { name, entries })
            }
        }
    }
}

/// A directory whose entries are in memory, normalised and non-empty.
#[derive(Clone, Debug)]
pub struct ResolvedDirectory {
    pub name: Option<String>,
    pub entries: Vec<DirectoryEntry>,
}

impl ResolvedDirectory {
    /// Total content size in bytes.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.content.len() as u64).sum()
    }

    /// Directory paths implied by the entries, parents before children.
    pub fn directories(&self) -> Vec<String> {
        let mut dirs = std::collections::BTreeSet::new();
        for entry in &self.entries {
            let mut prefix = String::new();
            let segments: Vec<&str> = entry.path.split('/').collect();
            for segment in &segments[..segments.len().saturating_sub(1)] {
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(segment);
                dirs.insert(prefix.clone());
            }
        }
        // BTreeSet order puts "a" before "a/b", which is all parents-first needs.
        dirs.into_iter().collect()
    }
}

/// Everything that can be uploaded in one call.
#[derive(Clone, Debug)]
pub enum UploadInput {
    Bytes { name: String, data: Bytes },
    Text(String),
    Json(serde_json::Value),
    Url(String),
    File(FileInput),
    Directory(DirectoryInput),
}

impl UploadInput {
    /// Build a JSON input from any serialisable value, rejecting values that
    /// have no JSON representation.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        crate::finite::check(value)
            .map_err(|e| Error::InvalidInput(format!("value is not representable as JSON: {e}")))?;
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| Error::InvalidInput(format!("value is not representable as JSON: {e}")))
    }
}

/// Canonical byte encoding of a JSON value: object keys sorted, no whitespace.
pub fn canonical_json(value: &serde_json::Value) -> Result<Bytes> {
    let sorted = sort_keys(value);
    serde_json::to_vec(&sorted)
        .map(Bytes::from)
        .map_err(|e| Error::Encoding(e.to_string()))
}

fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Normalise a relative entry path.
///
/// Backslashes become `/`, leading `./` and `/` are dropped, and empty, `.`
/// or `..` segments are rejected.
pub fn normalize_path(path: &str) -> Result<String> {
    let unified = path.replace('\\', "/");
    let mut trimmed = unified.as_str();
    loop {
        if let Some(rest) = trimmed.strip_prefix("./") {
            trimmed = rest;
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            trimmed = rest;
        } else {
            break;
        }
    }

    if trimmed.is_empty() {
        return Err(Error::InvalidPath(format!("empty path: {path:?}")));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(Error::InvalidPath(format!(
            "path contains a control character: {path:?}"
        )));
    }
    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(Error::InvalidPath(format!(
                "path contains an invalid segment: {path}"
            )));
        }
    }
    Ok(trimmed.to_string())
}

fn normalize_entries(files: Vec<DirectoryEntry>) -> Result<Vec<DirectoryEntry>> {
    let mut seen = HashSet::with_capacity(files.len());
    files
        .into_iter()
        .map(|entry| {
            let path = normalize_path(&entry.path)?;
            if !seen.insert(path.clone()) {
                return Err(Error::InvalidPath(format!("duplicate path: {path}")));
            }
            Ok(DirectoryEntry {
                path,
                content: entry.content,
            })
        })
        .collect()
}

fn collect_files(root: &Path, pattern: &str) -> Result<Vec<DirectoryEntry>> {
    if !root.exists() {
        return Err(Error::PathNotFound(root.to_path_buf()));
    }
    if root.is_file() {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidPath(root.display().to_string()))?;
        return Ok(vec![DirectoryEntry::new(name, std::fs::read(root)?)]);
    }

    let full_pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        pattern.trim_start_matches('/')
    );
    let paths = glob::glob(&full_pattern)
        .map_err(|e| Error::InvalidInput(format!("invalid glob pattern {pattern:?}: {e}")))?;

    let mut entries = Vec::new();
    for path in paths {
        let path = path.map_err(|e| Error::Io(e.into_error()))?;
        if !path.is_file() {
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .map_err(|_| Error::InvalidPath(path.display().to_string()))?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push(DirectoryEntry::new(
            normalize_path(&relative)?,
            std::fs::read(&path)?,
        ));
    }

    if entries.is_empty() {
        return Err(Error::NoFiles(format!(
            "no files under {} match {pattern}",
            root.display()
        )));
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}
