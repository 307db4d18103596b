//! Typed request/response contract between capture surfaces and the pipeline.
//!
//! The wire shape (`{"type": "submitToFeishu", ...}`) matches what the
//! extension pages and the desktop widget already send.

use crate::drain::SyncDrainer;
use crate::error::CloudError;
use crate::history::{HistoryLog, Profile};
use crate::selection::SelectionSlot;
use crate::submission::SubmissionService;
use crate::types::*;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// A request from a capture surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    TextSelected {
        text: String,
        page_url: String,
        #[serde(default)]
        page_title: Option<String>,
    },
    SubmitToFeishu {
        username: String,
        word: String,
        #[serde(default)]
        industry: String,
        #[serde(default)]
        source_url: Option<String>,
    },
    GetWordHistory,
    GetUsername,
    GetCurrentSelection,
    SyncOffline,
}

/// The pipeline's answer to a [`Command`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    Ack,
    Submitted {
        outcome: SubmissionResult,
        message: String,
    },
    History {
        history: Vec<HistoryEntry>,
    },
    Username {
        username: String,
    },
    CurrentSelection {
        selection: Option<Selection>,
    },
    Synced {
        report: SyncReport,
    },
    Error {
        message: String,
    },
}

impl From<CloudError> for Response {
    fn from(e: CloudError) -> Self {
        Response::Error {
            message: e.reason(),
        }
    }
}

/// Title recorded for selections whose page has none.
const UNKNOWN_PAGE_TITLE: &str = "Unknown page";

/// Dispatches [`Command`]s and maintains the submission side effects
/// (history and default username) on top of [`SubmissionService`].
pub struct CommandHandler {
    service: Arc<SubmissionService>,
    drainer: Arc<SyncDrainer>,
    history: Arc<HistoryLog>,
    profile: Arc<Profile>,
    selection: Arc<SelectionSlot>,
}

impl CommandHandler {
    pub fn new(
        service: Arc<SubmissionService>,
        drainer: Arc<SyncDrainer>,
        history: Arc<HistoryLog>,
        profile: Arc<Profile>,
        selection: Arc<SelectionSlot>,
    ) -> Self {
        Self {
            service,
            drainer,
            history,
            profile,
            selection,
        }
    }

    pub async fn handle(&self, command: Command) -> Response {
        match command {
            Command::TextSelected {
                text,
                page_url,
                page_title,
            } => {
                let title = page_title
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| UNKNOWN_PAGE_TITLE.to_string());
                match self.selection.capture(text, page_url, title).await {
                    Ok(_) => Response::Ack,
                    Err(e) => e.into(),
                }
            }
            Command::SubmitToFeishu {
                username,
                word,
                industry,
                source_url,
            } => self.submit(username, word, industry, source_url).await,
            Command::GetWordHistory => match self.history.list().await {
                Ok(history) => Response::History { history },
                Err(e) => e.into(),
            },
            Command::GetUsername => match self.profile.username().await {
                Ok(username) => Response::Username { username },
                Err(e) => e.into(),
            },
            Command::GetCurrentSelection => match self.selection.current().await {
                Ok(selection) => Response::CurrentSelection { selection },
                Err(e) => e.into(),
            },
            Command::SyncOffline => match self.drainer.drain().await {
                Ok(report) => Response::Synced { report },
                Err(e) => e.into(),
            },
        }
    }

    async fn submit(
        &self,
        username: String,
        word: String,
        industry: String,
        source_url: Option<String>,
    ) -> Response {
        let source_url = match source_url.filter(|u| !u.trim().is_empty()) {
            Some(url) => url,
            None => match self.selection.current().await {
                Ok(selection) => selection.map(|s| s.page_url).unwrap_or_default(),
                Err(e) => {
                    warn!("could not read current selection: {e}");
                    String::new()
                }
            },
        };

        let record = VocabularyRecord::new(username, word, industry, source_url);
        let outcome = self.service.submit(record.clone()).await;

        let message = match &outcome {
            SubmissionResult::Accepted { record_id } => {
                self.remember(&record).await;
                format!("Saved \"{}\" to the table (record {record_id})", record.word)
            }
            SubmissionResult::Queued => format!(
                "Offline: \"{}\" was saved locally and will be submitted \
                 when the connection returns",
                record.word
            ),
            SubmissionResult::Rejected(rejection) => rejection.reason.clone(),
        };

        Response::Submitted { outcome, message }
    }

    /// History and username updates never change the submission outcome.
    async fn remember(&self, record: &VocabularyRecord) {
        let entry = HistoryEntry {
            word: record.word.clone(),
            industry: record.industry.clone(),
            source_url: normalize_source_url(&record.source_url),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.history.record(entry).await {
            warn!("failed to update word history: {e}");
        }
        if let Err(e) = self.profile.set_username(&record.account_name).await {
            warn!("failed to persist username: {e}");
        }
    }
}
