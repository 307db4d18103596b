//! Local key/value persistence for the vocabulary capture pipeline.
//!
//! Hosts (a browser extension background worker, a desktop tray app) hand the
//! pipeline a store of named JSON values. The pipeline builds its token cache,
//! offline queue and history on top of it.
//!
//! # Implementations
//!
//! - [`MemoryStore`]: process-local map, lost on exit
//! - [`JsonFileStore`]: a single JSON document on disk, rewritten atomically

mod error;
mod file;
mod memory;

pub use error::{StorageError, StorageResult};
pub use file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A store of named JSON values.
///
/// Each call is atomic on its own. Read-modify-write sequences spanning
/// several calls are not, so callers that need them must serialize access.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Removes every key.
    async fn clear(&self) -> StorageResult<()>;
}

/// Typed access on top of [`KeyValueStore`].
#[async_trait]
pub trait KeyValueStoreExt: KeyValueStore {
    /// Reads `key` and deserializes it into `T`.
    async fn get_as<T>(&self, key: &str) -> StorageResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(Value::Null) | None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| StorageError::Decode {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Serializes `value` and stores it under `key`.
    async fn set_as<T>(&self, key: &str, value: &T) -> StorageResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let json = serde_json::to_value(value)?;
        self.set(key, json).await
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}
