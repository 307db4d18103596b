//! Shared types for the submission pipeline.

use crate::error::{CloudError, CloudResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scheme prepended to source URLs that have none.
pub const DEFAULT_URL_SCHEME: &str = "https://";

/// A tenant access token and its absolute expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub expires_at_ms: i64,
}

impl Credential {
    /// Returns true if the token is still usable at `now_ms` once `margin_ms`
    /// is shaved off its lifetime.
    pub fn is_usable_at(&self, now_ms: i64, margin_ms: i64) -> bool {
        now_ms < self.expires_at_ms.saturating_sub(margin_ms)
    }

    /// Returns true if the token will expire within the given seconds.
    pub fn expires_within_secs(&self, secs: i64) -> bool {
        !self.is_usable_at(Utc::now().timestamp_millis(), secs.saturating_mul(1000))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

/// A word or phrase captured by the user, ready to be filed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyRecord {
    pub account_name: String,
    pub word: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl VocabularyRecord {
    pub fn new(
        account_name: impl Into<String>,
        word: impl Into<String>,
        industry: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            account_name: account_name.into(),
            word: word.into(),
            industry: industry.into(),
            source_url: source_url.into(),
            created_at: Utc::now(),
        }
    }

    /// Checks the required fields.
    pub fn validate(&self) -> CloudResult<()> {
        if self.word.trim().is_empty() {
            return Err(CloudError::Validation("word is required".to_string()));
        }
        if self.account_name.trim().is_empty() {
            return Err(CloudError::Validation("account name is required".to_string()));
        }
        Ok(())
    }

    /// Returns the record with its source URL made absolute.
    pub fn normalized(mut self) -> Self {
        self.source_url = normalize_source_url(&self.source_url);
        self
    }
}

/// Prefixes [`DEFAULT_URL_SCHEME`] to a URL without a scheme.
///
/// Blank input stays blank; the URL column is optional.
pub fn normalize_source_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || has_scheme(url) {
        url.to_string()
    } else {
        format!("{DEFAULT_URL_SCHEME}{url}")
    }
}

fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// A record waiting in the offline queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: VocabularyRecord,
    pub queued_at_ms: i64,
}

impl QueueEntry {
    pub fn new(record: VocabularyRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            record,
            queued_at_ms: Utc::now().timestamp_millis(),
        }
    }
}

/// Why a submission was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// A required field was missing; nothing was sent.
    Validation,
    /// No token could be obtained.
    Auth,
    /// The remote answered with a non-zero application code.
    RemoteApplication,
    /// Any other transport or local failure.
    Other,
}

/// A refused submission with the message to surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub reason: String,
}

impl From<&CloudError> for Rejection {
    fn from(e: &CloudError) -> Self {
        let kind = match e {
            CloudError::Validation(_) => RejectionKind::Validation,
            CloudError::AuthFailed(_) => RejectionKind::Auth,
            CloudError::RemoteApplication { .. } => RejectionKind::RemoteApplication,
            _ => RejectionKind::Other,
        };
        Self {
            kind,
            reason: e.reason(),
        }
    }
}

/// Outcome of a single submission. Exactly one per call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionResult {
    Accepted { record_id: String },
    Rejected(Rejection),
    Queued,
}

impl SubmissionResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionResult::Accepted { .. })
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, SubmissionResult::Queued)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            SubmissionResult::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

/// A queued record dropped during a drain because the remote refused it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub record: VocabularyRecord,
    pub reason: String,
}

/// Summary of one drain cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub synced_count: usize,
    pub failed_count: usize,
    pub remaining_queue_length: usize,
    pub errors: Vec<SyncFailure>,
}

impl SyncReport {
    /// True when every entry was delivered.
    pub fn is_complete(&self) -> bool {
        self.failed_count == 0 && self.remaining_queue_length == 0
    }
}

/// A row read back from the remote table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub id: String,
    pub account_name: String,
    pub word: String,
    pub industry: String,
    pub source_url: String,
    /// Creation time in epoch milliseconds, when the remote reports it.
    pub created_time: Option<i64>,
}

/// One page of remote rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPage {
    pub records: Vec<RemoteRecord>,
    pub page_token: Option<String>,
    pub has_more: bool,
}

/// Partial update of a remote row. `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUpdate {
    pub account_name: Option<String>,
    pub word: Option<String>,
    pub industry: Option<String>,
    pub source_url: Option<String>,
}

/// A locally remembered successful submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub word: String,
    pub industry: String,
    pub source_url: String,
    pub timestamp: DateTime<Utc>,
}

/// Text the user last selected, with where it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub text: String,
    pub page_url: String,
    pub page_title: String,
    pub timestamp: DateTime<Utc>,
}
