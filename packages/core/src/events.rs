//! Lifecycle events emitted by a job queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EnqueueError;
use crate::job::{JobSeq, JobState};
use crate::queue::{QueueId, QueueState};

/// Events emitted by a job queue for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    // Queue events
    /// The queue moved to a new lifecycle state.
    QueueStateChanged {
        queue_id: QueueId,
        old_state: QueueState,
        new_state: QueueState,
        timestamp: DateTime<Utc>,
    },

    // Job events
    /// A job was admitted.
    JobEnqueued {
        queue_id: QueueId,
        seq: JobSeq,
        timestamp: DateTime<Utc>,
    },
    /// A job was refused at admission.
    JobRejected {
        queue_id: QueueId,
        seq: JobSeq,
        reason: EnqueueError,
        timestamp: DateTime<Utc>,
    },
    /// A worker started a job.
    JobStarted {
        queue_id: QueueId,
        seq: JobSeq,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A job's start routine returned and its async phase is running.
    JobParked {
        queue_id: QueueId,
        seq: JobSeq,
        timestamp: DateTime<Utc>,
    },
    /// A job's async phase completed.
    JobReady {
        queue_id: QueueId,
        seq: JobSeq,
        timestamp: DateTime<Utc>,
    },
    /// A job reached `CompletedSync` or `CompletedAsync`.
    JobCompleted {
        queue_id: QueueId,
        seq: JobSeq,
        state: JobState,
        timestamp: DateTime<Utc>,
    },
    /// A job was evicted past its deadline.
    JobTimedOut {
        queue_id: QueueId,
        seq: JobSeq,
        timestamp: DateTime<Utc>,
    },
    /// A job's routine panicked.
    JobAborted {
        queue_id: QueueId,
        seq: JobSeq,
        error: String,
        timestamp: DateTime<Utc>,
    },

    // Worker events
    /// A worker was spawned.
    WorkerStarted {
        queue_id: QueueId,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker found nothing to do and stopped.
    WorkerExited {
        queue_id: QueueId,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl QueueEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            QueueEvent::QueueStateChanged { timestamp, .. } => *timestamp,
            QueueEvent::JobEnqueued { timestamp, .. } => *timestamp,
            QueueEvent::JobRejected { timestamp, .. } => *timestamp,
            QueueEvent::JobStarted { timestamp, .. } => *timestamp,
            QueueEvent::JobParked { timestamp, .. } => *timestamp,
            QueueEvent::JobReady { timestamp, .. } => *timestamp,
            QueueEvent::JobCompleted { timestamp, .. } => *timestamp,
            QueueEvent::JobTimedOut { timestamp, .. } => *timestamp,
            QueueEvent::JobAborted { timestamp, .. } => *timestamp,
            QueueEvent::WorkerStarted { timestamp, .. } => *timestamp,
            QueueEvent::WorkerExited { timestamp, .. } => *timestamp,
        }
    }

    /// Get the queue the event belongs to.
    pub fn queue_id(&self) -> QueueId {
        match self {
            QueueEvent::QueueStateChanged { queue_id, .. }
            | QueueEvent::JobEnqueued { queue_id, .. }
            | QueueEvent::JobRejected { queue_id, .. }
            | QueueEvent::JobStarted { queue_id, .. }
            | QueueEvent::JobParked { queue_id, .. }
            | QueueEvent::JobReady { queue_id, .. }
            | QueueEvent::JobCompleted { queue_id, .. }
            | QueueEvent::JobTimedOut { queue_id, .. }
            | QueueEvent::JobAborted { queue_id, .. }
            | QueueEvent::WorkerStarted { queue_id, .. }
            | QueueEvent::WorkerExited { queue_id, .. } => *queue_id,
        }
    }

    /// Get the job sequence number associated with this event, if any.
    pub fn seq(&self) -> Option<JobSeq> {
        match self {
            QueueEvent::JobEnqueued { seq, .. }
            | QueueEvent::JobRejected { seq, .. }
            | QueueEvent::JobStarted { seq, .. }
            | QueueEvent::JobParked { seq, .. }
            | QueueEvent::JobReady { seq, .. }
            | QueueEvent::JobCompleted { seq, .. }
            | QueueEvent::JobTimedOut { seq, .. }
            | QueueEvent::JobAborted { seq, .. } => Some(*seq),
            _ => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            QueueEvent::QueueStateChanged {
                queue_id,
                new_state,
                ..
            } => format!("Queue {} -> {}", queue_id, new_state),
            QueueEvent::JobEnqueued { seq, .. } => format!("Job {} enqueued", seq),
            QueueEvent::JobRejected { seq, reason, .. } => {
                format!("Job {} rejected: {}", seq, reason)
            }
            QueueEvent::JobStarted { seq, worker_id, .. } => {
                format!("Job {} started by {}", seq, worker_id)
            }
            QueueEvent::JobParked { seq, .. } => format!("Job {} waiting on async work", seq),
            QueueEvent::JobReady { seq, .. } => format!("Job {} ready to complete", seq),
            QueueEvent::JobCompleted { seq, state, .. } => format!("Job {} -> {}", seq, state),
            QueueEvent::JobTimedOut { seq, .. } => format!("Job {} timed out", seq),
            QueueEvent::JobAborted { seq, error, .. } => format!("Job {} aborted: {}", seq, error),
            QueueEvent::WorkerStarted { worker_id, .. } => format!("Worker {} started", worker_id),
            QueueEvent::WorkerExited { worker_id, .. } => format!("Worker {} exited", worker_id),
        }
    }
}
