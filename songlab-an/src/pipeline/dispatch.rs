//! Dispatch queue and worker pool
//!
//! The queue is the only state shared across jobs. Workers block on it until
//! an item arrives or the pool's shutdown token fires.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::cancellation::CancellationRegistry;
use super::PipelineRunner;
use crate::models::SourceFile;

/// A job waiting for a worker
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub job_id: Uuid,
    pub source: SourceFile,
    pub cancel_token: CancellationToken,
}

/// FIFO of pending work items
#[derive(Default)]
pub struct DispatchQueue {
    items: Mutex<VecDeque<WorkItem>>,
    notify: Notify,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, item: WorkItem) {
        self.items.lock().await.push_back(item);
        self.notify.notify_one();
    }

    /// Non-blocking pop
    pub async fn try_pop(&self) -> Option<WorkItem> {
        self.items.lock().await.pop_front()
    }

    /// Wait for the next item; `None` once `shutdown` fires
    pub async fn pop(&self, shutdown: &CancellationToken) -> Option<WorkItem> {
        loop {
            if shutdown.is_cancelled() {
                return None;
            }

            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking so a concurrent push is not missed
            notified.as_mut().enable();

            if let Some(item) = self.items.lock().await.pop_front() {
                return Some(item);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = shutdown.cancelled() => return None,
            }
        }
    }

    /// Remove the queued items of one job; returns how many were removed
    pub async fn remove_job(&self, job_id: Uuid) -> usize {
        let mut items = self.items.lock().await;
        let before = items.len();
        items.retain(|item| item.job_id != job_id);
        before - items.len()
    }

    /// Remove every queued item
    pub async fn purge_all(&self) -> Vec<WorkItem> {
        self.items.lock().await.drain(..).collect()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    pub async fn contains(&self, job_id: Uuid) -> bool {
        self.items.lock().await.iter().any(|item| item.job_id == job_id)
    }
}

/// Fixed set of worker tasks draining a [`DispatchQueue`]
pub struct WorkerPool {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `workers` tasks; zero workers leaves the queue undrained
    pub fn spawn(
        workers: usize,
        queue: Arc<DispatchQueue>,
        runner: Arc<PipelineRunner>,
        tokens: CancellationRegistry,
    ) -> Self {
        let shutdown = CancellationToken::new();

        let handles = (0..workers)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let runner = Arc::clone(&runner);
                let tokens = Arc::clone(&tokens);
                let shutdown = shutdown.clone();

                tokio::spawn(async move {
                    debug!(worker_id, "Worker started");
                    while let Some(item) = queue.pop(&shutdown).await {
                        let job_id = item.job_id;
                        runner.run(item).await;
                        tokens.write().await.remove(&job_id);
                    }
                    debug!(worker_id, "Worker stopped");
                })
            })
            .collect();

        info!(workers, "Worker pool started");
        Self { shutdown, handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Stop pulling new items and wait for in-flight jobs to finish
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("Worker pool stopped");
    }
}
