//! In-memory object store that can stamp its own CID on every object.

use async_trait::async_trait;
use bytes::Bytes;
use cidfan_storage::{ObjectMeta, ObjectStore, PutOptions, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, (Bytes, PutOptions)>>,
    assigned_cid: Option<String>,
}

#[allow(dead_code)]
impl MemoryStore {
    /// A store that overwrites `cid` and sets `ipfs-hash` to `cid` on every put.
    pub fn assigning(cid: &str) -> Self {
        Self {
            objects: Mutex::default(),
            assigned_cid: Some(cid.to_string()),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn bytes(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).map(|(data, _)| data.clone())
    }

    pub fn options(&self, key: &str) -> Option<PutOptions> {
        self.objects.lock().unwrap().get(key).map(|(_, o)| o.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let objects = self.objects.lock().unwrap();
        let (data, options) = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ObjectMeta {
            size: data.len() as u64,
            last_modified: None,
            content_type: options.content_type.clone(),
            metadata: options.metadata.clone(),
        })
    }

    async fn put(&self, key: &str, data: Bytes, mut options: PutOptions) -> StorageResult<()> {
        if let Some(cid) = &self.assigned_cid {
            options.metadata.remove("cid");
            options.metadata.insert("ipfs-hash".to_string(), cid.clone());
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, options));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
