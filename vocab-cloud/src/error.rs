//! Pipeline error types.
//!
//! The transport layer converts every `reqwest::Error` into one of these
//! variants, so callers decide between "queue for later" and "report to the
//! user" with a `match` instead of inspecting error messages.

use thiserror::Error;
use vocab_storage::StorageError;

/// Result type for pipeline operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Application codes the open platform returns for a missing, invalid or
/// expired tenant access token.
pub const INVALID_TOKEN_CODES: [i64; 3] = [99991661, 99991663, 99991668];

/// Errors that can occur while submitting or syncing records.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("invalid record: {0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("network unreachable: {0}")]
    Connectivity(String),

    #[error("remote API error {code}: {msg}")]
    RemoteApplication { code: i64, msg: String },

    #[error("API request failed: {0}")]
    Api(String),

    #[error("queue index {index} out of bounds (length {len})")]
    QueueIndex { index: usize, len: usize },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("drain loop not running")]
    NotRunning,
}

impl From<reqwest::Error> for CloudError {
    fn from(e: reqwest::Error) -> Self {
        // Name resolution failures surface as connect errors.
        if e.is_connect() || e.is_timeout() {
            CloudError::Connectivity(describe(&e))
        } else if e.is_decode() {
            CloudError::Api(format!("undecodable response: {}", describe(&e)))
        } else {
            CloudError::Api(describe(&e))
        }
    }
}

impl CloudError {
    /// True for transport faults that mean the remote could not be reached.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, CloudError::Connectivity(_))
    }

    /// True when the remote rejected the bearer token itself.
    pub fn is_invalid_token(&self) -> bool {
        matches!(
            self,
            CloudError::RemoteApplication { code, .. } if INVALID_TOKEN_CODES.contains(code)
        )
    }

    /// The message to show a user: the remote message verbatim when there
    /// is one, otherwise the rendered error.
    pub fn reason(&self) -> String {
        match self {
            CloudError::RemoteApplication { msg, .. } if !msg.is_empty() => msg.clone(),
            CloudError::Validation(msg) | CloudError::AuthFailed(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// Renders an error with its source chain, which is where reqwest keeps
/// the interesting part ("dns error", "connection refused").
fn describe(e: &(dyn std::error::Error + 'static)) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        out.push_str(": ");
        out.push_str(&s.to_string());
        source = s.source();
    }
    out
}
