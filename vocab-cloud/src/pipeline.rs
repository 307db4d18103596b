//! Wires the pipeline components over one store.

use crate::api_client::BitableClient;
use crate::commands::CommandHandler;
use crate::config::BitableConfig;
use crate::credential_cache::CredentialCache;
use crate::drain::{DrainHandle, DrainLoop, SyncDrainer, create_drain_loop};
use crate::error::CloudResult;
use crate::history::{HistoryLog, Profile};
use crate::queue::OfflineQueue;
use crate::records::RecordManager;
use crate::retry::RetryPolicy;
use crate::selection::SelectionSlot;
use crate::submission::SubmissionService;
use std::sync::Arc;
use std::time::Duration;
use vocab_storage::KeyValueStore;

/// Every component, sharing one API client and one store.
pub struct VocabPipeline {
    pub config: BitableConfig,
    pub credentials: Arc<CredentialCache>,
    pub queue: Arc<OfflineQueue>,
    pub service: Arc<SubmissionService>,
    pub drainer: Arc<SyncDrainer>,
    pub records: Arc<RecordManager>,
    pub history: Arc<HistoryLog>,
    pub profile: Arc<Profile>,
    pub selection: Arc<SelectionSlot>,
}

impl VocabPipeline {
    pub fn new(config: BitableConfig, store: Arc<dyn KeyValueStore>) -> CloudResult<Self> {
        config.validate()?;

        let api = Arc::new(BitableClient::new(config.clone())?);
        let credentials = Arc::new(CredentialCache::new(Arc::clone(&api), Arc::clone(&store)));
        let queue = Arc::new(OfflineQueue::new(Arc::clone(&store)));
        let service = Arc::new(SubmissionService::new(
            Arc::clone(&api),
            Arc::clone(&credentials),
            Arc::clone(&queue),
            RetryPolicy::from_config(&config),
        ));
        let drainer = Arc::new(SyncDrainer::new(Arc::clone(&service)));
        let records = Arc::new(RecordManager::new(api, Arc::clone(&credentials)));
        let history = Arc::new(HistoryLog::new(Arc::clone(&store), config.history_limit));
        let profile = Arc::new(Profile::new(Arc::clone(&store), config.default_username.clone()));
        let selection = Arc::new(SelectionSlot::new(store));

        Ok(Self {
            config,
            credentials,
            queue,
            service,
            drainer,
            records,
            history,
            profile,
            selection,
        })
    }

    pub fn command_handler(&self) -> CommandHandler {
        CommandHandler::new(
            Arc::clone(&self.service),
            Arc::clone(&self.drainer),
            Arc::clone(&self.history),
            Arc::clone(&self.profile),
            Arc::clone(&self.selection),
        )
    }

    /// Builds the background drain loop at the configured interval.
    /// The caller spawns [`DrainLoop::run`].
    pub fn drain_loop(&self) -> (DrainHandle, DrainLoop) {
        create_drain_loop(
            Arc::clone(&self.drainer),
            Duration::from_secs(self.config.drain_interval_secs.max(1)),
        )
    }
}
