//! Cancellation coordinator
//!
//! Cancel is best effort. The job's token is signalled so a running
//! pipeline stops at its next stage boundary; the job's queued work is
//! removed; the stored state is evicted so later reads report not-found.
//! Removing every queued item is a separate operation, used for cancel only
//! when `cancel_purges_queue` is enabled.

use chrono::Utc;
use serde::Serialize;
use songlab_common::events::{EventBus, SongLabEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::dispatch::DispatchQueue;
use super::store::{JobStateStore, StoreError};
use crate::models::JobState;

/// Live cancellation tokens, keyed by job
pub type CancellationRegistry = Arc<RwLock<HashMap<Uuid, CancellationToken>>>;

/// Message given to jobs removed by a full queue purge
pub const PURGED_MESSAGE: &str = "Cancelled: dispatch queue purged";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelAck {
    pub job_id: Uuid,
    /// A worker owned the job when the cancel arrived
    pub was_running: bool,
    /// Queued work items removed
    pub removed_from_queue: usize,
    /// Job was already terminal; nothing changed
    pub already_finished: bool,
    pub message: String,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CancelError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),
}

pub struct CancellationCoordinator {
    store: Arc<JobStateStore>,
    queue: Arc<DispatchQueue>,
    tokens: CancellationRegistry,
    events: EventBus,
    purge_queue_on_cancel: bool,
}

impl CancellationCoordinator {
    pub fn new(
        store: Arc<JobStateStore>,
        queue: Arc<DispatchQueue>,
        tokens: CancellationRegistry,
        events: EventBus,
        purge_queue_on_cancel: bool,
    ) -> Self {
        Self {
            store,
            queue,
            tokens,
            events,
            purge_queue_on_cancel,
        }
    }

    pub async fn cancel(&self, job_id: Uuid) -> Result<CancelAck, CancelError> {
        let job = self
            .store
            .get(job_id)
            .await
            .ok_or(CancelError::NotFound(job_id))?;

        if job.is_terminal() {
            tracing::debug!(job_id = %job_id, state = ?job.state(), "Cancel on finished job ignored");
            return Ok(CancelAck {
                job_id,
                was_running: false,
                removed_from_queue: 0,
                already_finished: true,
                message: format!("Task already finished ({:?})", job.state()),
            });
        }

        let was_running = job.state() == JobState::Running;

        if let Some(token) = self.tokens.read().await.get(&job_id) {
            token.cancel();
        }

        let removed_from_queue = if self.purge_queue_on_cancel {
            self.purge_queue(job_id).await
        } else {
            self.queue.remove_job(job_id).await
        };

        match self
            .store
            .update(job_id, |job| {
                job.transition_to(JobState::Cancelled);
                job.snapshot.status_message = "Cancelled".to_string();
            })
            .await
        {
            Ok(_) => {}
            // Finished between the read above and now
            Err(StoreError::Terminal(_, state)) => {
                tracing::debug!(job_id = %job_id, state = ?state, "Job finished before cancel landed");
                return Ok(CancelAck {
                    job_id,
                    was_running,
                    removed_from_queue,
                    already_finished: true,
                    message: format!("Task already finished ({state:?})"),
                });
            }
            Err(StoreError::NotFound(_)) => return Err(CancelError::NotFound(job_id)),
        }

        self.store.remove(job_id).await;
        self.tokens.write().await.remove(&job_id);

        tracing::info!(
            job_id = %job_id,
            was_running,
            removed_from_queue,
            "Job cancelled"
        );

        self.events.emit_lossy(SongLabEvent::JobCancelled {
            job_id,
            was_running,
            timestamp: Utc::now(),
        });

        Ok(CancelAck {
            job_id,
            was_running,
            removed_from_queue,
            already_finished: false,
            message: "Task cancelled".to_string(),
        })
    }

    /// Drop every queued item; other purged jobs are marked Cancelled
    async fn purge_queue(&self, requested_by: Uuid) -> usize {
        let purged = self.queue.purge_all().await;
        let removed = purged.len();

        for item in purged.into_iter().filter(|item| item.job_id != requested_by) {
            item.cancel_token.cancel();
            self.tokens.write().await.remove(&item.job_id);

            let result = self
                .store
                .update(item.job_id, |job| {
                    job.transition_to(JobState::Cancelled);
                    job.snapshot.status_message = PURGED_MESSAGE.to_string();
                })
                .await;

            if result.is_ok() {
                self.events.emit_lossy(SongLabEvent::JobCancelled {
                    job_id: item.job_id,
                    was_running: false,
                    timestamp: Utc::now(),
                });
            }
        }

        tracing::warn!(requested_by = %requested_by, removed, "Dispatch queue purged");
        self.events.emit_lossy(SongLabEvent::QueuePurged {
            requested_by,
            removed,
            timestamp: Utc::now(),
        });

        removed
    }
}
