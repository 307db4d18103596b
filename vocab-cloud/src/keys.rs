//! Names of the values the pipeline keeps in the local store.
//!
//! These match the names the browser extension and desktop widget already
//! use, so an existing store can be read as-is.

pub const FEISHU_TOKEN: &str = "feishuToken";
pub const TOKEN_EXPIRY: &str = "tokenExpiry";
/// Expiry key written by the desktop widget.
pub const LEGACY_TOKEN_EXPIRY: &str = "feishuTokenExpiry";
pub const OFFLINE_QUEUE: &str = "offlineQueue";
pub const WORD_HISTORY: &str = "wordHistory";
pub const USERNAME: &str = "username";
pub const CURRENT_SELECTION: &str = "currentSelection";
