//! Reading and editing rows that are already in the remote table.

use crate::api_client::BitableClient;
use crate::credential_cache::CredentialCache;
use crate::error::CloudResult;
use crate::types::{RecordPage, RecordUpdate, RemoteRecord};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::debug;

/// Rows fetched per request by [`RecordManager::list_all`].
pub const LIST_PAGE_SIZE: u32 = 100;

pub struct RecordManager {
    api: Arc<BitableClient>,
    credentials: Arc<CredentialCache>,
}

impl RecordManager {
    pub fn new(api: Arc<BitableClient>, credentials: Arc<CredentialCache>) -> Self {
        Self { api, credentials }
    }

    pub async fn list_page(
        &self,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> CloudResult<RecordPage> {
        let api = &self.api;
        self.credentials
            .authorized(move |token| async move {
                api.list_records(&token, page_size, page_token).await
            })
            .await
    }

    /// Fetches every row, newest first, optionally only those filed under
    /// `account_name`.
    pub async fn list_all(&self, account_name: Option<&str>) -> CloudResult<Vec<RemoteRecord>> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_page(Some(LIST_PAGE_SIZE), page_token.as_deref())
                .await?;
            records.extend(page.records);
            match page.page_token {
                Some(next) if page.has_more => page_token = Some(next),
                _ => break,
            }
        }
        debug!("fetched {} remote records", records.len());

        if let Some(name) = account_name {
            records.retain(|r| r.account_name == name);
        }
        records.sort_by_key(|r| Reverse(r.created_time.unwrap_or(0)));
        Ok(records)
    }

    pub async fn update(&self, record_id: &str, update: &RecordUpdate) -> CloudResult<()> {
        let api = &self.api;
        self.credentials
            .authorized(move |token| async move {
                api.update_record(&token, record_id, update).await
            })
            .await
    }

    pub async fn delete(&self, record_id: &str) -> CloudResult<()> {
        let api = &self.api;
        self.credentials
            .authorized(move |token| async move { api.delete_record(&token, record_id).await })
            .await
    }
}
