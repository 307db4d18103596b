//! JSON-document store on the local filesystem.
//!
//! The whole store is one JSON object kept in memory and rewritten on every
//! mutation. Writes go to a sibling temp file first and are renamed over the
//! document, so a crash mid-write leaves the previous version intact.

use crate::KeyValueStore;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// File-backed [`KeyValueStore`].
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Opens the store at `path`, creating parent directories as needed.
    ///
    /// A missing file opens an empty store. A file that is not a JSON object
    /// is moved aside to `<path>.corrupt` and the store starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let values = match tokio::fs::read(&path).await {
            Ok(bytes) => match parse_document(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    let aside = sidecar(&path, "corrupt");
                    warn!(
                        "store {} is unreadable ({e}), moving it to {}",
                        path.display(),
                        aside.display()
                    );
                    tokio::fs::rename(&path, &aside).await?;
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        debug!("opened store {} with {} keys", path.display(), values.len());
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Default location under the platform's local data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vocab-capture")
            .join("store.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, values: &Map<String, Value>) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(values)?;
        let tmp = sidecar(&self.path, "tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn parse_document(bytes: &[u8]) -> StorageResult<Map<String, Value>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) => Ok(map),
        other => Err(StorageError::Corrupt(format!("found {other}"))),
    }
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let mut values = self.values.lock().await;
        values.insert(key.to_string(), value);
        self.persist(&values).await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let mut values = self.values.lock().await;
        if values.remove(key).is_some() {
            self.persist(&values).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        let mut values = self.values.lock().await;
        values.clear();
        self.persist(&values).await
    }
}
