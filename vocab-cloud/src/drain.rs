//! Offline queue draining.
//!
//! [`SyncDrainer::drain`] replays a snapshot of the queue in FIFO order and
//! rewrites the queue once at the end. A crash between a successful remote
//! write and that rewrite replays the entry on the next drain, and the
//! remote has no idempotency key, so the row can be duplicated.
//!
//! [`DrainLoop`] runs drains on an interval and on request, following the
//! usual handle + event-loop split.

use crate::error::{CloudError, CloudResult};
use crate::queue::OfflineQueue;
use crate::submission::SubmissionService;
use crate::types::{SyncFailure, SyncReport};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Replays queued records through the submission service.
pub struct SyncDrainer {
    service: Arc<SubmissionService>,
    queue: Arc<OfflineQueue>,
    /// Only one drain may work on the queue at a time.
    drain_lock: Mutex<()>,
}

impl SyncDrainer {
    pub fn new(service: Arc<SubmissionService>) -> Self {
        let queue = Arc::clone(service.queue());
        Self {
            service,
            queue,
            drain_lock: Mutex::new(()),
        }
    }

    /// Delivers what it can and reports the rest.
    ///
    /// Entries that are still unreachable stay queued in their original
    /// order; entries the remote refuses are dropped and listed in
    /// [`SyncReport::errors`].
    pub async fn drain(&self) -> CloudResult<SyncReport> {
        let _guard = self.drain_lock.lock().await;

        let snapshot = self.queue.list_all().await?;
        if snapshot.is_empty() {
            return Ok(SyncReport::default());
        }
        info!("draining {} queued records", snapshot.len());

        let mut report = SyncReport::default();
        let mut processed = HashSet::with_capacity(snapshot.len());
        let mut survivors = Vec::new();

        for entry in snapshot {
            processed.insert(entry.id);
            match self.service.deliver(&entry.record).await {
                Ok(record_id) => {
                    debug!("synced queued {:?} as {record_id}", entry.record.word);
                    report.synced_count += 1;
                }
                Err(e) if e.is_connectivity() => {
                    debug!("still unreachable, keeping {:?}", entry.record.word);
                    survivors.push(entry);
                }
                Err(e) => {
                    warn!("dropping queued {:?}: {e}", entry.record.word);
                    report.failed_count += 1;
                    report.errors.push(SyncFailure {
                        reason: e.reason(),
                        record: entry.record,
                    });
                }
            }
        }

        report.remaining_queue_length = self.queue.compact(&processed, survivors).await?;
        info!(
            "drain finished: {} synced, {} failed, {} remaining",
            report.synced_count, report.failed_count, report.remaining_queue_length
        );
        Ok(report)
    }
}

enum DrainCommand {
    DrainNow(Option<oneshot::Sender<CloudResult<SyncReport>>>),
    Stop,
}

/// Handle for sending commands to a running [`DrainLoop`].
#[derive(Clone)]
pub struct DrainHandle {
    command_tx: mpsc::Sender<DrainCommand>,
}

impl DrainHandle {
    /// Drains now and waits for the report. Use on app start or reconnect.
    pub async fn drain_now(&self) -> CloudResult<SyncReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(DrainCommand::DrainNow(Some(reply_tx)))
            .await
            .map_err(|_| CloudError::NotRunning)?;
        reply_rx.await.map_err(|_| CloudError::NotRunning)?
    }

    /// Schedules a drain without waiting for it.
    pub async fn request_drain(&self) -> CloudResult<()> {
        self.command_tx
            .send(DrainCommand::DrainNow(None))
            .await
            .map_err(|_| CloudError::NotRunning)
    }

    pub async fn stop(&self) -> CloudResult<()> {
        self.command_tx
            .send(DrainCommand::Stop)
            .await
            .map_err(|_| CloudError::NotRunning)
    }
}

/// Background loop that drains on an interval and on request.
pub struct DrainLoop {
    drainer: Arc<SyncDrainer>,
    command_rx: mpsc::Receiver<DrainCommand>,
    interval: Duration,
}

/// Creates a drain loop and its command handle.
pub fn create_drain_loop(
    drainer: Arc<SyncDrainer>,
    interval: Duration,
) -> (DrainHandle, DrainLoop) {
    let (command_tx, command_rx) = mpsc::channel(16);
    (
        DrainHandle { command_tx },
        DrainLoop {
            drainer,
            command_rx,
            interval,
        },
    )
}

impl DrainLoop {
    /// Runs until stopped or until every handle is dropped.
    ///
    /// The first interval tick fires immediately, so whatever was queued
    /// before startup is retried right away.
    pub async fn run(mut self) {
        info!("drain loop started, interval {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.drainer.drain().await {
                        error!("scheduled drain failed: {e}");
                    }
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(DrainCommand::DrainNow(reply)) => {
                            let result = self.drainer.drain().await;
                            if let Err(e) = &result {
                                error!("requested drain failed: {e}");
                            }
                            if let Some(reply) = reply {
                                let _ = reply.send(result);
                            }
                        }
                        Some(DrainCommand::Stop) => {
                            info!("drain loop stopping");
                            break;
                        }
                        None => {
                            info!("command channel closed, stopping drain loop");
                            break;
                        }
                    }
                }
            }
        }

        info!("drain loop stopped");
    }
}
