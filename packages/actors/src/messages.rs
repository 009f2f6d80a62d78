//! Message types for actor communication.

use queue_core::{
    ConfigError, FinishedJob, JobSeq, PendingJob, QueueInfo, QueueStats, QueuedJob, Rejection,
    Work,
};
use ractor::RpcReplyPort;

/// Messages for the QueueActor.
#[derive(Debug)]
pub enum QueueMessage {
    /// Admit a new job.
    Enqueue {
        job: Box<QueuedJob>,
        reply: RpcReplyPort<Result<JobSeq, Rejection>>,
    },

    /// Request the next step for a worker.
    NextWork {
        worker_id: String,
        reply: RpcReplyPort<Work>,
    },

    /// A job's start routine returned without completing.
    JobParked { worker_id: String, seq: JobSeq },

    /// A parked job signalled readiness and needs a worker to finish it.
    AsyncReady { job: Box<PendingJob> },

    /// A worker completed a job.
    JobFinished {
        worker_id: String,
        done: FinishedJob,
    },

    /// A job's start or finish routine panicked.
    JobAborted {
        worker_id: String,
        seq: JobSeq,
        error: String,
    },

    /// The timeout hook of an evicted job returned.
    TimeoutHandled { seq: JobSeq },

    /// Stop admitting jobs and reply once drained.
    Close { reply: RpcReplyPort<()> },

    /// Get queue info.
    GetInfo { reply: RpcReplyPort<QueueInfo> },

    /// Get queue stats.
    GetStats { reply: RpcReplyPort<QueueStats> },

    /// Periodic tick for the deadline sweep.
    Tick,
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Ask the queue for work and run it.
    Pump,
}

/// Error type for queue runtime operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Invalid queue config: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to spawn queue actor: {0}")]
    Spawn(String),

    #[error("Queue actor unavailable: {0}")]
    Unavailable(String),
}
