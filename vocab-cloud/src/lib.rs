//! Offline-resilient vocabulary submission for Feishu bitables.
//!
//! Files captured words into a shared table with:
//! - Tenant token caching with early refresh
//! - Exponential backoff around the record POST
//! - A durable offline queue for records sent while unreachable
//! - Queue draining on an interval and on reconnect
//! - A typed command contract for capture surfaces

pub mod api_client;
pub mod commands;
pub mod config;
pub mod credential_cache;
pub mod drain;
pub mod error;
pub mod history;
pub mod keys;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod records;
pub mod retry;
pub mod selection;
pub mod submission;
pub mod types;

pub use config::BitableConfig;
pub use error::{CloudError, CloudResult};
pub use pipeline::VocabPipeline;
pub use types::*;
