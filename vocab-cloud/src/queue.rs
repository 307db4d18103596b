//! Durable FIFO of records that could not be delivered.
//!
//! The whole queue is one ordered array under a single store key. Entries
//! are removed only after the remote confirms them or rejects them for good.
//! Read-modify-write cycles are serialized within the process; nothing
//! guards against a second process writing the same store.
//!
//! Entries written by the browser extension (`username`, ISO
//! `queueTimestamp`) and the desktop widget (no id, no timestamp) are
//! upgraded on first read and written back with stable ids. Entries that
//! cannot be read at all are moved to `<key>.unreadable` so the rest of the
//! queue keeps working.

use crate::error::{CloudError, CloudResult};
use crate::keys;
use crate::types::{QueueEntry, VocabularyRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vocab_storage::{KeyValueStore, KeyValueStoreExt};

pub struct OfflineQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
    aside_key: String,
    /// Held for every read too, since a read may rewrite older entries.
    write_lock: Mutex<()>,
}

/// Any entry shape found under the queue key.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    id: Option<Uuid>,
    #[serde(alias = "username")]
    account_name: String,
    word: String,
    industry: Option<String>,
    source_url: Option<String>,
    created_at: Option<DateTime<Utc>>,
    queued_at_ms: Option<i64>,
    queue_timestamp: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn is_current(&self) -> bool {
        self.id.is_some() && self.queued_at_ms.is_some() && self.created_at.is_some()
    }

    fn into_entry(self) -> QueueEntry {
        let created_at = self
            .created_at
            .or(self.queue_timestamp)
            .unwrap_or_else(Utc::now);
        let queued_at_ms = self
            .queued_at_ms
            .or(self.queue_timestamp.map(|t| t.timestamp_millis()))
            .unwrap_or_else(|| created_at.timestamp_millis());
        QueueEntry {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            record: VocabularyRecord {
                account_name: self.account_name,
                word: self.word,
                industry: self.industry.unwrap_or_default(),
                source_url: self.source_url.unwrap_or_default(),
                created_at,
            },
            queued_at_ms,
        }
    }
}

impl OfflineQueue {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, keys::OFFLINE_QUEUE)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            store,
            aside_key: format!("{key}.unreadable"),
            key,
            write_lock: Mutex::new(()),
        }
    }

    /// Appends a record and returns the stored entry.
    pub async fn enqueue(&self, record: VocabularyRecord) -> CloudResult<QueueEntry> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        let entry = QueueEntry::new(record);
        entries.push(entry.clone());
        self.save(&entries).await?;
        info!(
            "queued {:?} for later delivery ({} pending)",
            entry.record.word,
            entries.len()
        );
        Ok(entry)
    }

    /// Returns every entry in delivery order.
    pub async fn list_all(&self) -> CloudResult<Vec<QueueEntry>> {
        let _guard = self.write_lock.lock().await;
        self.load().await
    }

    pub async fn len(&self) -> CloudResult<usize> {
        let _guard = self.write_lock.lock().await;
        Ok(self.load().await?.len())
    }

    pub async fn is_empty(&self) -> CloudResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Removes the entry at `index` of the current queue.
    ///
    /// The queue may have changed since it was listed; an index past the
    /// current end fails with [`CloudError::QueueIndex`].
    pub async fn remove_at(&self, index: usize) -> CloudResult<QueueEntry> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        if index >= entries.len() {
            return Err(CloudError::QueueIndex {
                index,
                len: entries.len(),
            });
        }
        let removed = entries.remove(index);
        self.save(&entries).await?;
        debug!("removed queue entry {} at index {index}", removed.id);
        Ok(removed)
    }

    /// Replaces the processed part of the queue with `survivors` in one write.
    ///
    /// `processed` holds the ids a drain pass took from its snapshot. Entries
    /// enqueued after that snapshot are not in it and are kept, after the
    /// survivors. Returns the new queue length.
    pub async fn compact(
        &self,
        processed: &HashSet<Uuid>,
        survivors: Vec<QueueEntry>,
    ) -> CloudResult<usize> {
        let _guard = self.write_lock.lock().await;
        let current = self.load().await?;
        let mut entries = survivors;
        entries.extend(current.into_iter().filter(|e| !processed.contains(&e.id)));
        self.save(&entries).await?;
        Ok(entries.len())
    }

    /// Drops every entry.
    pub async fn clear(&self) -> CloudResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(&self.key).await?;
        Ok(())
    }

    /// Reads the queue, upgrading older entry shapes in place. Callers hold
    /// `write_lock`.
    async fn load(&self) -> CloudResult<Vec<QueueEntry>> {
        let items = match self.store.get(&self.key).await? {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(other) => {
                warn!("{} is not a list, moving it to {}", self.key, self.aside_key);
                self.set_aside(vec![other]).await?;
                self.store.remove(&self.key).await?;
                return Ok(Vec::new());
            }
        };

        let mut entries = Vec::with_capacity(items.len());
        let mut unreadable = Vec::new();
        let mut rewrite = false;
        for item in items {
            match StoredEntry::deserialize(&item) {
                Ok(stored) => {
                    rewrite |= !stored.is_current();
                    entries.push(stored.into_entry());
                }
                Err(e) => {
                    warn!("unreadable entry in {}: {e}", self.key);
                    unreadable.push(item);
                }
            }
        }

        if !unreadable.is_empty() {
            self.set_aside(unreadable).await?;
            rewrite = true;
        }
        if rewrite {
            info!("rewrote {} with {} upgraded entries", self.key, entries.len());
            self.save(&entries).await?;
        }
        Ok(entries)
    }

    /// Appends values to the side key, keeping whatever is already there.
    async fn set_aside(&self, mut values: Vec<Value>) -> CloudResult<()> {
        let mut aside = match self.store.get(&self.aside_key).await? {
            Some(Value::Array(existing)) => existing,
            _ => Vec::new(),
        };
        aside.append(&mut values);
        self.store.set(&self.aside_key, Value::Array(aside)).await?;
        Ok(())
    }

    async fn save(&self, entries: &[QueueEntry]) -> CloudResult<()> {
        self.store.set_as(&self.key, entries).await?;
        Ok(())
    }
}
