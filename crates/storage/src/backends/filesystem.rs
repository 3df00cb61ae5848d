//! Local filesystem storage backend.
//!
//! Objects live under the root at their key. Content type and user metadata
//! are kept in a JSON sidecar under `.meta/`, written before the object so a
//! visible object always has its metadata.

use crate::error::{StorageError, StorageResult};
use crate::traits::{Metadata, ObjectMeta, ObjectStore, PutOptions};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

const META_DIR: &str = ".meta";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
    content_type: Option<String>,
    #[serde(default)]
    metadata: Metadata,
}

/// Local filesystem object store.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend, creating the root if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Resolve a key to its object and sidecar paths, rejecting traversal.
    async fn key_paths(&self, key: &str) -> StorageResult<(PathBuf, PathBuf)> {
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let object = Self::key_path_sync(&root, &key)?;
            let sidecar = Self::key_path_sync(&root, &format!("{META_DIR}/{key}.json"))?;
            Ok((object, sidecar))
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}"))))?
    }

    fn key_path_sync(root: &Path, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!("not a relative key: {key:?}")));
        }
        if !Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(format!(
                "contains unsafe path component: {key}"
            )));
        }

        let root_canonical = root.canonicalize()?;
        let path = root.join(key);

        // The nearest existing ancestor (or the path itself) must resolve inside
        // the root, so symlinks cannot redirect reads or writes elsewhere.
        let mut cursor = Some(path.as_path());
        while let Some(candidate) = cursor {
            match std::fs::symlink_metadata(candidate) {
                Ok(meta) => {
                    let resolved = candidate.canonicalize().map_err(|e| {
                        if meta.file_type().is_symlink() {
                            StorageError::InvalidKey(format!("dangling symlink in key: {key}"))
                        } else {
                            StorageError::Io(e)
                        }
                    })?;
                    if !resolved.starts_with(&root_canonical) {
                        return Err(StorageError::InvalidKey(format!(
                            "resolved path escapes storage root: {key}"
                        )));
                    }
                    break;
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    cursor = candidate.parent();
                }
                Err(err) => return Err(StorageError::Io(err)),
            }
        }

        Ok(path)
    }

    async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = path.with_file_name(format!("{file_name}.tmp.{}", Uuid::new_v4()));
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, path).await?;
        Ok(())
    }

    async fn read_sidecar(path: &Path) -> StorageResult<Sidecar> {
        match fs::read(path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                StorageError::InvalidMetadata(format!("{}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Sidecar::default()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

fn not_found(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let (path, sidecar_path) = self.key_paths(key).await?;
        let metadata = fs::metadata(&path).await.map_err(not_found(key))?;
        let sidecar = Self::read_sidecar(&sidecar_path).await?;

        Ok(ObjectMeta {
            size: metadata.len(),
            last_modified: metadata.modified().ok().map(|t| t.into()),
            content_type: sidecar.content_type,
            metadata: sidecar.metadata,
        })
    }

    #[instrument(skip(self, data, options), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes, options: PutOptions) -> StorageResult<()> {
        if key == META_DIR || key.starts_with(&format!("{META_DIR}/")) {
            return Err(StorageError::InvalidKey(format!("reserved key: {key}")));
        }
        let (path, sidecar_path) = self.key_paths(key).await?;

        let sidecar = Sidecar {
            content_type: options.content_type,
            metadata: options.metadata,
        };
        let encoded = serde_json::to_vec(&sidecar)
            .map_err(|e| StorageError::InvalidMetadata(e.to_string()))?;
        Self::write_atomic(&sidecar_path, &encoded).await?;
        Self::write_atomic(&path, &data).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let (path, sidecar_path) = self.key_paths(key).await?;
        fs::remove_file(&path).await.map_err(not_found(key))?;
        match fs::remove_file(&sidecar_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let marker = self.root.join(format!(".health-check.{}", Uuid::new_v4()));
        Self::write_atomic(&marker, b"health-check").await?;
        fs::remove_file(&marker).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_head_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        let options = PutOptions::default()
            .content_type("application/vnd.ipld.car")
            .metadata("import", "car")
            .metadata("cid", "bafyroot");
        backend
            .put("uploads/root.car", Bytes::from("car bytes"), options)
            .await
            .unwrap();

        let meta = backend.head("uploads/root.car").await.unwrap();
        assert_eq!(meta.size, 9);
        assert_eq!(meta.metadata_value("cid"), Some("bafyroot"));
        assert_eq!(meta.metadata_value("import"), Some("car"));
        assert_eq!(meta.content_type.as_deref(), Some("application/vnd.ipld.car"));
        assert_eq!(
            std::fs::read(dir.path().join("uploads/root.car")).unwrap(),
            b"car bytes"
        );
    }

    #[tokio::test]
    async fn test_put_replaces_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        backend
            .put("k", Bytes::from("1"), PutOptions::default().metadata("cid", "a"))
            .await
            .unwrap();
        backend
            .put("k", Bytes::from("2"), PutOptions::default())
            .await
            .unwrap();
        let meta = backend.head("k").await.unwrap();
        assert!(meta.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_missing_object_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        assert!(matches!(
            backend.head("missing").await,
            Err(StorageError::NotFound(_))
        ));

        backend
            .put("present", Bytes::from("x"), PutOptions::default().metadata("cid", "c"))
            .await
            .unwrap();
        backend.delete("present").await.unwrap();
        assert!(matches!(
            backend.head("present").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!dir.path().join(".meta/present.json").exists());
        assert!(matches!(
            backend.delete("present").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        for key in ["../escape", "/absolute/path", "foo/../bar"] {
            assert!(matches!(
                backend.head(key).await,
                Err(StorageError::InvalidKey(_))
            ));
        }
        assert!(
            backend
                .put(".meta/x.json", Bytes::new(), PutOptions::default())
                .await
                .is_err()
        );
        assert!(matches!(
            backend.head("valid/nested/key").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_symlink_traversal_rejected() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "secret").unwrap();

        let backend = FilesystemBackend::new(dir.path()).await.unwrap();
        symlink(outside.path(), dir.path().join("escape")).unwrap();

        let read = backend.head("escape/secret.txt").await;
        assert!(matches!(read, Err(StorageError::InvalidKey(_))));

        let write = backend
            .put("escape/nested/file", Bytes::from("x"), PutOptions::default())
            .await;
        assert!(write.is_err());
        assert!(!outside.path().join("nested").exists());
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();
        backend.health_check().await.unwrap();
    }
}
