//! Event types for the SongLab event system
//!
//! Provides shared event definitions and the EventBus used to fan job
//! progress out to SSE clients.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// SongLab event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Progress values are always 0-100 and never decrease for a given job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SongLabEvent {
    /// A file was accepted and its job placed on the dispatch queue
    JobQueued {
        job_id: Uuid,
        /// Original file name as uploaded
        file_name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A worker picked the job up and a stage began
    JobStageStarted {
        job_id: Uuid,
        /// Stage name (e.g. "stem_separation")
        stage: String,
        /// Progress at stage start (0-100)
        progress: u8,
        /// Human-readable status line
        status: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A stage finished and its output was published as a partial result
    JobProgress {
        job_id: Uuid,
        stage: String,
        progress: u8,
        status: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job reached Succeeded
    JobSucceeded {
        job_id: Uuid,
        duration_seconds: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job reached Failed
    JobFailed {
        job_id: Uuid,
        /// Stage that raised, None for input validation failures
        stage: Option<String>,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job reached Cancelled
    JobCancelled {
        job_id: Uuid,
        /// Whether a worker was executing the job when the cancel arrived
        was_running: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Pending work items were removed from the dispatch queue
    QueuePurged {
        /// Job whose cancellation triggered the purge
        requested_by: Uuid,
        /// Number of work items removed
        removed: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SongLabEvent {
    /// Get event type as string (used as the SSE `event:` field)
    pub fn event_type(&self) -> &str {
        match self {
            SongLabEvent::JobQueued { .. } => "JobQueued",
            SongLabEvent::JobStageStarted { .. } => "JobStageStarted",
            SongLabEvent::JobProgress { .. } => "JobProgress",
            SongLabEvent::JobSucceeded { .. } => "JobSucceeded",
            SongLabEvent::JobFailed { .. } => "JobFailed",
            SongLabEvent::JobCancelled { .. } => "JobCancelled",
            SongLabEvent::QueuePurged { .. } => "QueuePurged",
        }
    }

    /// Job this event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            SongLabEvent::JobQueued { job_id, .. }
            | SongLabEvent::JobStageStarted { job_id, .. }
            | SongLabEvent::JobProgress { job_id, .. }
            | SongLabEvent::JobSucceeded { job_id, .. }
            | SongLabEvent::JobFailed { job_id, .. }
            | SongLabEvent::JobCancelled { job_id, .. } => *job_id,
            SongLabEvent::QueuePurged { requested_by, .. } => *requested_by,
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over a tokio broadcast channel. Slow subscribers lag and
/// lose old events rather than blocking the publisher.
///
/// # Examples
///
/// ```
/// use songlab_common::events::{EventBus, SongLabEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(SongLabEvent::JobQueued {
///     job_id: uuid::Uuid::new_v4(),
///     file_name: "song.mp3".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "JobQueued");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SongLabEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SongLabEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SongLabEvent,
    ) -> Result<usize, broadcast::error::SendError<SongLabEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SongLabEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
