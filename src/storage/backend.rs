//! Durable storage backends
//!
//! A backend maps namespace keys to JSON documents. A `write` either
//! replaces the whole document or fails leaving the previous one in place.

use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the document stored under `key`. `Ok(None)` when absent.
    async fn read(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the document stored under `key`
    async fn write(&self, key: &str, value: &Value) -> Result<()>;

    /// Delete the document stored under `key`. Absent keys are not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per namespace inside a data directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (and create if needed) a data directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }
}

/// Namespace keys contain `:` and other characters that are not portable
/// in file names
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::StorageReadCorrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn write(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4()));
        let bytes = serde_json::to_vec(value)?;

        if let Err(e) = write_synced(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Storage(format!("write {}: {}", key, e)));
        }
        // rename is atomic on the same filesystem
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Storage(format!("commit {}: {}", key, e)));
        }
        // Persist the rename itself. Not every platform can open a directory.
        if let Ok(dir) = tokio::fs::File::open(&self.dir).await {
            if let Err(e) = dir.sync_all().await {
                return Err(Error::Storage(format!("sync {}: {}", key, e)));
            }
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("remove {}: {}", key, e))),
        }
    }
}

/// Write `bytes` to a new file and flush it to disk
async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// In-process backend, used by tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    documents: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw document, bypassing any typed store
    pub async fn insert_raw(&self, key: &str, value: Value) {
        self.documents.write().await.insert(key.to_string(), value);
    }

    pub async fn raw(&self, key: &str) -> Option<Value> {
        self.documents.read().await.get(key).cloned()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &Value) -> Result<()> {
        self.documents
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.documents.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_file_stem_sanitizes_namespace() {
        assert_eq!(file_stem("core:whitelist"), "core_whitelist");
        assert_eq!(file_stem("PREAUTHORIZATION:APPROVED"), "PREAUTHORIZATION_APPROVED");
        assert_eq!(file_stem("../escape"), ".._escape");
    }

    #[tokio::test]
    async fn test_file_backend_roundtrip_and_remove() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();

        assert!(backend.read("core:whitelist").await.unwrap().is_none());

        backend
            .write("core:whitelist", &json!([{"host": "a.example"}]))
            .await
            .unwrap();
        let value = backend.read("core:whitelist").await.unwrap().unwrap();
        assert_eq!(value[0]["host"], "a.example");

        backend.remove("core:whitelist").await.unwrap();
        assert!(backend.read("core:whitelist").await.unwrap().is_none());
        // removing twice is fine
        backend.remove("core:whitelist").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_backend_reports_corrupt_documents() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("core_accounts.json"), "{not json").unwrap();

        let err = backend.read("core:accounts").await.unwrap_err();
        assert!(matches!(err, Error::StorageReadCorrupt { .. }));
    }

    #[tokio::test]
    async fn test_write_synced_persists_full_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json.tmp");
        write_synced(&path, br#"{"a":1}"#).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), br#"{"a":1}"#.to_vec());

        // an existing file is truncated, not appended to
        write_synced(&path, b"2").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"2".to_vec());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_document() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        backend.write("k", &json!({"v": 1})).await.unwrap();

        // a non-empty directory in place of the target makes the rename fail
        std::fs::create_dir(dir.path().join("other.json")).unwrap();
        std::fs::write(dir.path().join("other.json").join("x"), "x").unwrap();
        assert!(backend.write("other", &json!(2)).await.is_err());

        assert_eq!(backend.read("k").await.unwrap().unwrap()["v"], 1);
        let temps = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(temps, 0);
    }

    #[tokio::test]
    async fn test_file_backend_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        backend.write("k", &json!(1)).await.unwrap();
        backend.write("k", &json!(2)).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["k.json".to_string()]);
    }
}
