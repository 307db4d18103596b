//! Local history of accepted submissions and the user's display name.

use crate::error::CloudResult;
use crate::keys;
use crate::types::HistoryEntry;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use vocab_storage::{KeyValueStore, KeyValueStoreExt};

/// Newest-first list of accepted words, capped at `limit`.
pub struct HistoryLog {
    store: Arc<dyn KeyValueStore>,
    limit: usize,
    write_lock: Mutex<()>,
}

impl HistoryLog {
    pub fn new(store: Arc<dyn KeyValueStore>, limit: usize) -> Self {
        Self {
            store,
            limit,
            write_lock: Mutex::new(()),
        }
    }

    /// Prepends an entry, evicting the oldest ones beyond the limit.
    pub async fn record(&self, entry: HistoryEntry) -> CloudResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.list().await?;
        entries.insert(0, entry);
        entries.truncate(self.limit);
        self.store.set_as(keys::WORD_HISTORY, &entries).await?;
        debug!("history now holds {} entries", entries.len());
        Ok(())
    }

    /// Entries, newest first.
    pub async fn list(&self) -> CloudResult<Vec<HistoryEntry>> {
        Ok(self
            .store
            .get_as::<Vec<HistoryEntry>>(keys::WORD_HISTORY)
            .await?
            .unwrap_or_default())
    }

    pub async fn clear(&self) -> CloudResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(keys::WORD_HISTORY).await?;
        Ok(())
    }
}

/// The name submissions are filed under by default.
pub struct Profile {
    store: Arc<dyn KeyValueStore>,
    default_username: String,
}

impl Profile {
    pub fn new(store: Arc<dyn KeyValueStore>, default_username: impl Into<String>) -> Self {
        Self {
            store,
            default_username: default_username.into(),
        }
    }

    /// The stored name, or the configured default when none is stored.
    pub async fn username(&self) -> CloudResult<String> {
        Ok(self
            .store
            .get_as::<String>(keys::USERNAME)
            .await?
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.default_username.clone()))
    }

    pub async fn set_username(&self, username: &str) -> CloudResult<()> {
        self.store.set_as(keys::USERNAME, username).await?;
        Ok(())
    }
}
