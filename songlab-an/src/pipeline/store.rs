//! Job state store
//!
//! One `watch` channel per job. Every write replaces the whole job value, so
//! readers always see a complete snapshot. Writes enforce three rules:
//! progress never decreases, partial results only grow, and a terminal job
//! is never written again.

use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use crate::models::{AnalysisJob, JobState};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job {0} is already {1:?}")]
    Terminal(Uuid, JobState),
}

#[derive(Default)]
pub struct JobStateStore {
    jobs: RwLock<HashMap<Uuid, watch::Sender<AnalysisJob>>>,
}

impl JobStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: AnalysisJob) {
        let (tx, _rx) = watch::channel(job.clone());
        self.jobs.write().await.insert(job.job_id, tx);
    }

    /// Clone of the current job value
    pub async fn get(&self, job_id: Uuid) -> Option<AnalysisJob> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .map(|tx| tx.borrow().clone())
    }

    /// Receiver that observes every later write to the job
    pub async fn subscribe(&self, job_id: Uuid) -> Option<watch::Receiver<AnalysisJob>> {
        self.jobs.read().await.get(&job_id).map(|tx| tx.subscribe())
    }

    /// Apply `mutate` to a copy of the job and publish the result
    ///
    /// Progress is clamped to the previous value, earlier partial entries are
    /// carried over, and `updated_at` is refreshed. Terminal jobs are rejected.
    /// The whole read-modify-write runs under the channel's write lock, so
    /// concurrent writers are serialized and a terminal write is final.
    pub async fn update<F>(&self, job_id: Uuid, mutate: F) -> Result<AnalysisJob, StoreError>
    where
        F: FnOnce(&mut AnalysisJob),
    {
        let jobs = self.jobs.read().await;
        let tx = jobs.get(&job_id).ok_or(StoreError::NotFound(job_id))?;

        let mut outcome = Err(StoreError::NotFound(job_id));
        tx.send_if_modified(|current| {
            if current.is_terminal() {
                outcome = Err(StoreError::Terminal(job_id, current.state()));
                return false;
            }

            let mut next = current.clone();
            mutate(&mut next);

            next.job_id = current.job_id;
            next.snapshot.progress = next.snapshot.progress.max(current.snapshot.progress).min(100);
            next.snapshot.partial.absorb(&current.snapshot.partial);
            next.updated_at = Utc::now();
            if next.is_terminal() && next.finished_at.is_none() {
                next.finished_at = Some(next.updated_at);
            }

            *current = next.clone();
            outcome = Ok(next);
            true
        });
        outcome
    }

    /// Drop the job; returns the last value if it existed
    pub async fn remove(&self, job_id: Uuid) -> Option<AnalysisJob> {
        self.jobs
            .write()
            .await
            .remove(&job_id)
            .map(|tx| tx.borrow().clone())
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Job count per state
    pub async fn count_by_state(&self) -> HashMap<JobState, usize> {
        let mut counts = HashMap::new();
        for tx in self.jobs.read().await.values() {
            *counts.entry(tx.borrow().state()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChordSegment, SourceFile};

    async fn store_with_job() -> (JobStateStore, Uuid) {
        let store = JobStateStore::new();
        let job = AnalysisJob::new(SourceFile::new("/tmp/a.wav", "a.wav"));
        let id = job.job_id;
        store.insert(job).await;
        (store, id)
    }

    #[tokio::test]
    async fn test_progress_never_regresses() {
        let (store, id) = store_with_job().await;

        store
            .update(id, |job| {
                job.transition_to(JobState::Running);
                job.snapshot.progress = 50;
            })
            .await
            .unwrap();
        let job = store.update(id, |job| job.snapshot.progress = 20).await.unwrap();

        assert_eq!(job.snapshot.progress, 50);
        assert_eq!(store.get(id).await.unwrap().snapshot.progress, 50);
    }

    #[tokio::test]
    async fn test_partial_entries_survive_later_writes() {
        let (store, id) = store_with_job().await;

        store
            .update(id, |job| {
                job.snapshot.partial.chords = Some(vec![ChordSegment::new(0.0, 1.0, "C")]);
            })
            .await
            .unwrap();
        let job = store
            .update(id, |job| job.snapshot.partial = Default::default())
            .await
            .unwrap();

        assert!(job.snapshot.partial.chords.is_some());
    }

    #[tokio::test]
    async fn test_terminal_is_write_once() {
        let (store, id) = store_with_job().await;
        store
            .update(id, |job| job.transition_to(JobState::Succeeded))
            .await
            .unwrap();

        let err = store
            .update(id, |job| job.transition_to(JobState::Failed))
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::Terminal(id, JobState::Succeeded));
        assert_eq!(store.get(id).await.unwrap().state(), JobState::Succeeded);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_terminal_write_not_lost_to_slow_writer() {
        let (store, id) = store_with_job().await;
        let store = std::sync::Arc::new(store);

        let slow = {
            let store = std::sync::Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .update(id, |job| {
                        std::thread::sleep(std::time::Duration::from_millis(200));
                        job.transition_to(JobState::Running);
                        job.snapshot.progress = 50;
                    })
                    .await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let terminal = store
            .update(id, |job| job.transition_to(JobState::Cancelled))
            .await;

        assert!(slow.await.unwrap().is_ok());
        assert!(terminal.is_ok());

        let job = store.get(id).await.unwrap();
        assert_eq!(job.state(), JobState::Cancelled);
        assert_eq!(job.snapshot.progress, 50);
        assert!(store.update(id, |_| {}).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_writer_after_terminal_is_rejected() {
        let (store, id) = store_with_job().await;
        let store = std::sync::Arc::new(store);

        let writers: Vec<_> = (0..8u8)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .update(id, move |job| {
                            if i == 3 {
                                job.transition_to(JobState::Succeeded);
                            }
                            job.snapshot.progress = i * 10;
                        })
                        .await
                })
            })
            .collect();

        let mut terminal_writes = 0;
        for writer in writers {
            if let Ok(job) = writer.await.unwrap() {
                if job.is_terminal() {
                    terminal_writes += 1;
                }
            }
        }

        // exactly one write produced the terminal value
        assert_eq!(terminal_writes, 1);
        assert_eq!(store.get(id).await.unwrap().state(), JobState::Succeeded);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let store = JobStateStore::new();
        let id = Uuid::new_v4();
        assert_eq!(
            store.update(id, |_| {}).await.unwrap_err(),
            StoreError::NotFound(id)
        );
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn test_subscriber_sees_whole_values() {
        let (store, id) = store_with_job().await;
        let mut rx = store.subscribe(id).await.unwrap();

        store
            .update(id, |job| {
                job.transition_to(JobState::Running);
                job.snapshot.progress = 10;
                job.snapshot.status_message = "step".to_string();
            })
            .await
            .unwrap();

        rx.changed().await.unwrap();
        let seen = rx.borrow().clone();
        assert_eq!(seen.state(), JobState::Running);
        assert_eq!(seen.snapshot.progress, 10);
        assert_eq!(seen.snapshot.status_message, "step");
    }

    #[tokio::test]
    async fn test_remove_and_counts() {
        let (store, id) = store_with_job().await;
        assert_eq!(store.count_by_state().await.get(&JobState::Queued), Some(&1));
        assert!(store.remove(id).await.is_some());
        assert!(store.is_empty().await);
        assert!(store.remove(id).await.is_none());
    }
}
