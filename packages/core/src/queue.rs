//! Queue identity, lifecycle and statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::config::QueueConfig;

/// Unique identifier for a queue, used to correlate traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(pub Ulid);

impl QueueId {
    /// Create a new unique queue ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a queue ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for QueueId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a queue. Transitions only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// Accepting and processing jobs.
    #[default]
    Open,
    /// Rejecting new jobs, draining admitted ones.
    Closing,
    /// Drained; the root has been released.
    Closed,
}

impl QueueState {
    /// Check if the queue is accepting new jobs.
    pub fn is_accepting_jobs(&self) -> bool {
        matches!(self, QueueState::Open)
    }
}

impl std::fmt::Display for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueState::Open => write!(f, "open"),
            QueueState::Closing => write!(f, "closing"),
            QueueState::Closed => write!(f, "closed"),
        }
    }
}

/// Snapshot of a queue's limits, occupancy and lifetime counters.
///
/// Taken while other threads keep mutating the queue, so callers that
/// assert on it should poll until the values settle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    pub max_threads: usize,
    pub max_queue_size: usize,
    pub max_parallel_pending_work_count: usize,
    /// Workers currently alive.
    pub active_workers: usize,
    /// Admitted jobs not yet started.
    pub pending: usize,
    /// Jobs signalled ready, waiting for a worker to finish them.
    pub async_ready: usize,
    /// Jobs owned by a worker or waiting on their async phase.
    pub pending_process: usize,
    /// Jobs admitted since the queue started.
    pub enqueued: u64,
    /// Jobs refused with `QueueFull`.
    pub rejected: u64,
    pub completed_sync: u64,
    pub completed_async: u64,
    pub timed_out: u64,
    /// Jobs whose start or finish routine panicked.
    pub aborted: u64,
}

impl QueueStats {
    /// Jobs counted against the queue size limit.
    pub fn occupancy(&self) -> usize {
        self.pending + self.pending_process + self.async_ready
    }

    /// Jobs counted against the parallel work limit.
    pub fn in_flight(&self) -> usize {
        self.pending_process + self.async_ready
    }

    /// Jobs that reached a terminal state.
    pub fn processed(&self) -> u64 {
        self.completed_sync + self.completed_async + self.timed_out + self.aborted
    }

    /// Check that nothing is queued, running or waiting.
    pub fn is_idle(&self) -> bool {
        self.occupancy() == 0 && self.active_workers == 0
    }
}

/// Descriptive view of a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueInfo {
    pub id: QueueId,
    pub name: String,
    pub state: QueueState,
    pub config: QueueConfig,
    pub dequeue_policy: String,
    pub created_at: DateTime<Utc>,
}
