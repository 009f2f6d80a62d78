//! Actor runtime for the bounded job queue.
//!
//! # Architecture
//!
//! - `QueueActor` - Owns one queue's `SchedulerState`; every message is a
//!   single state transition
//! - `WorkerActor` - Logical worker, spawned on demand up to `max_threads`,
//!   running start/finish routines on the blocking pool
//! - `JobQueue` - Caller-facing handle: enqueue, close, stats, events
//!
//! # Usage
//!
//! ```ignore
//! use queue_actors::JobQueue;
//! use queue_core::QueueConfig;
//!
//! let queue = JobQueue::start(QueueConfig::new("activation"), root.clone()).await?;
//! queue.enqueue(MyJob::new()).await?;
//! queue.close().await?;
//! ```

mod handle;
mod messages;
mod queue_actor;
mod worker_actor;

pub use handle::JobQueue;
pub use messages::{QueueError, QueueMessage, WorkerMessage};
pub use queue_actor::{QueueActor, QueueActorState, Root};
pub use worker_actor::WorkerActor;

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
