use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::{CatalogError, Result};

/// Key/value storage that outlives the process (or pretends to).
#[async_trait]
pub trait PersistentCacheStore: Send + Sync {
    async fn write(&self, key: &str, value: &str) -> Result<()>;

    async fn read(&self, key: &str) -> Result<Option<String>>;

    async fn delete(&self, key: &str) -> Result<()>;

    fn is_durable(&self) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    File,
    Memory,
}

/// Picks the backend once. A file store whose directory cannot be created
/// degrades to memory-only.
pub fn open_store(kind: StoreKind, root: &Path) -> Arc<dyn PersistentCacheStore> {
    match kind {
        StoreKind::Memory => Arc::new(MemoryStore::default()),
        StoreKind::File => match FileStore::open(root) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                tracing::warn!(error = %err, root = %root.display(), "falling back to memory-only cache");
                Arc::new(MemoryStore::default())
            }
        },
    }
}

/// One JSON document per key under a cache directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|err| CatalogError::StorageUnavailable(err.to_string()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let digest = hex::encode(hasher.finalize());
        self.root.join(format!("{digest}.json"))
    }
}

#[async_trait]
impl PersistentCacheStore for FileStore {
    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)
            .await
            .map_err(|err| CatalogError::StorageUnavailable(err.to_string()))?;
        fs::rename(&staging, &path)
            .await
            .map_err(|err| CatalogError::StorageUnavailable(err.to_string()))
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CatalogError::StorageUnavailable(err.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CatalogError::StorageUnavailable(err.to_string())),
        }
    }
}

/// Session-only storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl PersistentCacheStore for MemoryStore {
    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }
}
