//! Core domain types for the bounded job queue.
//!
//! This crate is runtime-free and contains:
//! - The `JobItem` contract and the start/finish typestate wrappers
//! - Dequeue policies and the pending set
//! - In-flight accounting and the `SchedulerState` transitions
//! - Configuration, statistics and events

mod config;
mod error;
mod events;
mod job;
mod pending;
mod policy;
mod queue;
mod scheduler;
mod tracker;

#[cfg(test)]
mod testing;

pub use config::QueueConfig;
pub use error::{ConfigError, EnqueueError};
pub use events::QueueEvent;
pub use job::{
    FinishedJob, JobItem, JobSeq, JobState, PendingJob, QueuedJob, ReadyNotifier, ReadySignal,
    StartOutcome, Started, Ticket, ready_channel,
};
pub use pending::{Dequeued, PendingSet};
pub use policy::{DequeueOrder, DequeuePolicy, EarliestDeadline, Fifo, Lifo};
pub use queue::{QueueId, QueueInfo, QueueState, QueueStats};
pub use scheduler::{Admitted, Rejection, SchedulerState, Step, Work};
pub use tracker::InFlightTracker;
