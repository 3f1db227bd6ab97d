//! Analysis service facade
//!
//! Owns the store, dispatch queue, worker pool and cancellation coordinator.
//! Everything is constructed here and injected; nothing is global.

use chrono::{DateTime, Utc};
use serde::Serialize;
use songlab_common::events::{EventBus, SongLabEvent};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::cancellation::{CancelAck, CancelError, CancellationCoordinator, CancellationRegistry};
use super::dispatch::{DispatchQueue, WorkItem, WorkerPool};
use super::runner::PipelineRunner;
use super::store::JobStateStore;
use crate::config::ServiceConfig;
use crate::models::{AnalysisJob, AnalysisResult, JobStage, JobState, PartialResults, SourceFile};
use crate::services::Collaborators;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum JobError {
    #[error("Task not found: {0}")]
    NotFound(Uuid),

    #[error("Result not ready, task is {0:?}")]
    NotReady(JobState),

    #[error("Task is still {0:?}")]
    NotTerminal(JobState),
}

impl From<CancelError> for JobError {
    fn from(err: CancelError) -> Self {
        match err {
            CancelError::NotFound(id) => JobError::NotFound(id),
        }
    }
}

/// Client-facing status of one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    pub task_id: Uuid,
    pub state: JobState,
    pub progress: u8,
    pub stage: Option<JobStage>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present while running, and kept for failed jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<PartialResults>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&AnalysisJob> for JobStatus {
    fn from(job: &AnalysisJob) -> Self {
        let partial = match job.state() {
            JobState::Running | JobState::Failed if !job.snapshot.partial.is_empty() => {
                Some(job.snapshot.partial.clone())
            }
            _ => None,
        };

        Self {
            task_id: job.job_id,
            state: job.state(),
            progress: job.snapshot.progress,
            stage: job.snapshot.stage,
            status: job.snapshot.status_message.clone(),
            error: job.error.clone(),
            partial,
            submitted_at: job.submitted_at,
            updated_at: job.updated_at,
        }
    }
}

pub struct AnalysisService {
    store: Arc<JobStateStore>,
    queue: Arc<DispatchQueue>,
    tokens: CancellationRegistry,
    events: EventBus,
    runner: Arc<PipelineRunner>,
    coordinator: CancellationCoordinator,
    workers: Mutex<Option<WorkerPool>>,
}

impl AnalysisService {
    /// Build the service and start `config.workers` workers
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: &ServiceConfig, collaborators: Collaborators, events: EventBus) -> Self {
        let store = Arc::new(JobStateStore::new());
        let queue = Arc::new(DispatchQueue::new());
        let tokens: CancellationRegistry = Arc::new(RwLock::new(HashMap::new()));

        let runner = Arc::new(PipelineRunner::new(
            Arc::clone(&store),
            events.clone(),
            collaborators,
            config.parameters(),
            config.results_dir.clone(),
        ));

        let coordinator = CancellationCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            Arc::clone(&tokens),
            events.clone(),
            config.cancel_purges_queue,
        );

        let workers = WorkerPool::spawn(
            config.workers,
            Arc::clone(&queue),
            Arc::clone(&runner),
            Arc::clone(&tokens),
        );

        Self {
            store,
            queue,
            tokens,
            events,
            runner,
            coordinator,
            workers: Mutex::new(Some(workers)),
        }
    }

    /// Create a queued job for `source`
    pub async fn submit(&self, source: SourceFile) -> Uuid {
        let job = AnalysisJob::new(source.clone());
        let job_id = job.job_id;
        let cancel_token = CancellationToken::new();

        self.store.insert(job).await;
        self.tokens.write().await.insert(job_id, cancel_token.clone());

        self.events.emit_lossy(SongLabEvent::JobQueued {
            job_id,
            file_name: source.file_name.clone(),
            timestamp: Utc::now(),
        });
        tracing::info!(job_id = %job_id, file = %source.file_name, "Job queued");

        self.queue
            .push(WorkItem {
                job_id,
                source,
                cancel_token,
            })
            .await;

        job_id
    }

    pub async fn get_status(&self, job_id: Uuid) -> Result<JobStatus, JobError> {
        self.store
            .get(job_id)
            .await
            .map(|job| JobStatus::from(&job))
            .ok_or(JobError::NotFound(job_id))
    }

    pub async fn get_result(&self, job_id: Uuid) -> Result<AnalysisResult, JobError> {
        let job = self
            .store
            .get(job_id)
            .await
            .ok_or(JobError::NotFound(job_id))?;

        match (job.state(), job.result) {
            (JobState::Succeeded, Some(result)) => Ok(result),
            (state, _) => Err(JobError::NotReady(state)),
        }
    }

    pub async fn cancel(&self, job_id: Uuid) -> Result<CancelAck, JobError> {
        Ok(self.coordinator.cancel(job_id).await?)
    }

    /// Evict a finished job
    pub async fn forget(&self, job_id: Uuid) -> Result<(), JobError> {
        let job = self
            .store
            .get(job_id)
            .await
            .ok_or(JobError::NotFound(job_id))?;

        if !job.is_terminal() {
            return Err(JobError::NotTerminal(job.state()));
        }

        self.store.remove(job_id).await;
        self.tokens.write().await.remove(&job_id);
        tracing::info!(job_id = %job_id, "Job forgotten");
        Ok(())
    }

    /// Watch every write to one job
    pub async fn subscribe(&self, job_id: Uuid) -> Option<watch::Receiver<AnalysisJob>> {
        self.store.subscribe(job_id).await
    }

    /// Run the next queued job on the caller's task
    ///
    /// For deployments (and tests) with zero workers.
    pub async fn run_next(&self) -> Option<JobState> {
        let item = self.queue.try_pop().await?;
        let job_id = item.job_id;
        let state = self.runner.run(item).await;
        self.tokens.write().await.remove(&job_id);
        Some(state)
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.len().await
    }

    pub async fn job_count(&self) -> usize {
        self.store.len().await
    }

    pub async fn job_counts(&self) -> HashMap<JobState, usize> {
        self.store.count_by_state().await
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Stop the workers after their current jobs
    pub async fn shutdown(&self) {
        if let Some(workers) = self.workers.lock().await.take() {
            workers.shutdown().await;
        }
    }
}
