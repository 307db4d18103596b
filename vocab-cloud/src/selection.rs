//! Last selected text.
//!
//! A single slot with last-write-wins semantics. Capture hooks write it,
//! the submit form reads it back to prefill the word and source page.

use crate::error::CloudResult;
use crate::keys;
use crate::types::Selection;
use chrono::Utc;
use std::sync::Arc;
use vocab_storage::{KeyValueStore, KeyValueStoreExt};

pub struct SelectionSlot {
    store: Arc<dyn KeyValueStore>,
}

impl SelectionSlot {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Replaces the slot and returns what was stored.
    pub async fn capture(
        &self,
        text: impl Into<String>,
        page_url: impl Into<String>,
        page_title: impl Into<String>,
    ) -> CloudResult<Selection> {
        let selection = Selection {
            text: text.into(),
            page_url: page_url.into(),
            page_title: page_title.into(),
            timestamp: Utc::now(),
        };
        self.store.set_as(keys::CURRENT_SELECTION, &selection).await?;
        Ok(selection)
    }

    pub async fn current(&self) -> CloudResult<Option<Selection>> {
        Ok(self.store.get_as(keys::CURRENT_SELECTION).await?)
    }

    pub async fn clear(&self) -> CloudResult<()> {
        self.store.remove(keys::CURRENT_SELECTION).await?;
        Ok(())
    }
}
