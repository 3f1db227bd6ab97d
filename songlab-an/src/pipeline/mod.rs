//! Job orchestration
//!
//! Submission → [`DispatchQueue`] → [`WorkerPool`] → [`PipelineRunner`],
//! with state in [`JobStateStore`] and cancellation through
//! [`CancellationCoordinator`].

use thiserror::Error;

use crate::models::JobStage;
use crate::services::InputError;

pub mod cancellation;
pub mod dispatch;
pub mod runner;
pub mod service;
pub mod store;

pub use cancellation::{CancelAck, CancelError, CancellationCoordinator, CancellationRegistry};
pub use dispatch::{DispatchQueue, WorkItem, WorkerPool};
pub use runner::PipelineRunner;
pub use service::{AnalysisService, JobError, JobStatus};
pub use store::{JobStateStore, StoreError};

/// Why a job failed
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected before any stage ran
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("{stage} failed: {message}")]
    Stage { stage: JobStage, message: String },
}

/// Outcome of a stage that did not produce output
#[derive(Debug)]
pub(crate) enum StageError {
    Cancelled,
    Failed(String),
}
