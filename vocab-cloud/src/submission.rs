//! Record submission with offline fallback.
//!
//! `submit` validates, normalizes and delivers one record and maps the
//! outcome onto exactly one [`SubmissionResult`]:
//!
//! - delivered → `Accepted`
//! - remote unreachable (connect, DNS, timeout) → appended to the
//!   [`OfflineQueue`], `Queued`
//! - anything else → `Rejected`, with the remote message when there is one

use crate::api_client::BitableClient;
use crate::credential_cache::CredentialCache;
use crate::error::{CloudError, CloudResult};
use crate::queue::OfflineQueue;
use crate::retry::RetryPolicy;
use crate::types::{Rejection, SubmissionResult, VocabularyRecord};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct SubmissionService {
    api: Arc<BitableClient>,
    credentials: Arc<CredentialCache>,
    queue: Arc<OfflineQueue>,
    retry: RetryPolicy,
}

impl SubmissionService {
    pub fn new(
        api: Arc<BitableClient>,
        credentials: Arc<CredentialCache>,
        queue: Arc<OfflineQueue>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            api,
            credentials,
            queue,
            retry,
        }
    }

    /// Submits a record, queueing it if the remote cannot be reached.
    pub async fn submit(&self, record: VocabularyRecord) -> SubmissionResult {
        if let Err(e) = record.validate() {
            warn!("refusing record: {e}");
            return SubmissionResult::Rejected(Rejection::from(&e));
        }
        let record = record.normalized();

        match self.deliver(&record).await {
            Ok(record_id) => {
                info!("submitted {:?} as remote record {record_id}", record.word);
                SubmissionResult::Accepted { record_id }
            }
            Err(e) if e.is_connectivity() => {
                info!("remote unreachable ({e}), queueing {:?}", record.word);
                match self.queue.enqueue(record).await {
                    Ok(_) => SubmissionResult::Queued,
                    Err(qe) => {
                        error!("failed to queue record: {qe}");
                        SubmissionResult::Rejected(Rejection::from(&qe))
                    }
                }
            }
            Err(e) => {
                warn!("submission of {:?} rejected: {e}", record.word);
                SubmissionResult::Rejected(Rejection::from(&e))
            }
        }
    }

    /// Sends an already validated and normalized record.
    ///
    /// Only connectivity failures are retried. The error is returned
    /// unclassified; queueing is left to the caller.
    pub async fn deliver(&self, record: &VocabularyRecord) -> CloudResult<String> {
        let api = &self.api;
        let credentials = &self.credentials;
        self.retry
            .execute_if(
                move || {
                    credentials.authorized(move |token| async move {
                        api.create_record(&token, record).await
                    })
                },
                CloudError::is_connectivity,
            )
            .await
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }
}
