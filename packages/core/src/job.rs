//! Job items and the two-phase start/finish protocol.
//!
//! A [`JobItem`] is caller-supplied work. The queue wraps it in a
//! [`QueuedJob`] at enqueue time and drives it through consuming
//! transitions, so an item can never be started twice or finished before
//! it was started:
//!
//! ```text
//! QueuedJob ──start()──┬──> Started::Completed(FinishedJob)      CompletedSync
//!     │                └──> Started::Pending(PendingJob, signal)
//!     │                           └──finish()──> FinishedJob     CompletedAsync
//!     └──time_out()──> FinishedJob                               TimedOut
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::EnqueueError;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-wide sequence number of a job, never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct JobSeq(pub u64);

impl JobSeq {
    /// Allocate the next sequence number.
    pub fn next() -> Self {
        Self(NEXT_SEQ.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a job item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Admitted (or about to be) and waiting for a worker.
    #[default]
    NotStarted,
    /// Start routine returned; waiting for the item to signal readiness.
    AsyncPending,
    /// Start routine completed synchronously and the finish routine ran.
    CompletedSync,
    /// Finish routine ran after the asynchronous phase.
    CompletedAsync,
    /// Evicted from the pending set before it was started.
    TimedOut,
}

impl JobState {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::CompletedSync | JobState::CompletedAsync | JobState::TimedOut
        )
    }

    /// Get a simple state string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::NotStarted => "not_started",
            JobState::AsyncPending => "async_pending",
            JobState::CompletedSync => "completed_sync",
            JobState::CompletedAsync => "completed_async",
            JobState::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create a readiness channel for an asynchronous start.
///
/// The item keeps the [`ReadyNotifier`] and returns the [`ReadySignal`]
/// from [`JobItem::start_work`] inside [`StartOutcome::Pending`].
pub fn ready_channel() -> (ReadyNotifier, ReadySignal) {
    let (tx, rx) = oneshot::channel();
    (ReadyNotifier { tx }, ReadySignal { rx })
}

/// Sending half of a readiness channel. Fire it from any thread.
#[derive(Debug)]
pub struct ReadyNotifier {
    tx: oneshot::Sender<()>,
}

impl ReadyNotifier {
    /// Signal that the asynchronous phase is done and the item can finish.
    pub fn notify(self) {
        // Receiver gone means the queue was torn down; nothing to wake.
        let _ = self.tx.send(());
    }
}

/// Receiving half of a readiness channel, awaited by the queue.
#[derive(Debug)]
pub struct ReadySignal {
    rx: oneshot::Receiver<()>,
}

impl ReadySignal {
    /// Wait for readiness. Returns `false` if the notifier was dropped
    /// without firing.
    pub async fn wait(self) -> bool {
        self.rx.await.is_ok()
    }
}

/// What a start routine reports back.
#[derive(Debug)]
pub enum StartOutcome {
    /// The work is done; the finish routine runs right away.
    Completed,
    /// The work continues elsewhere and will fire the paired notifier.
    Pending(ReadySignal),
}

/// Work submitted to a job queue.
///
/// These methods are the only places caller-supplied logic runs. The
/// queue never holds its own state lock while calling them.
pub trait JobItem: Send + 'static {
    /// Free-form description, used for logging.
    fn desc(&self) -> &str {
        "job"
    }

    /// Deadline for being started, measured from admission.
    ///
    /// `None` falls back to the queue's default timeout.
    fn work_timeout(&self) -> Option<Duration> {
        None
    }

    /// Start the work.
    fn start_work(&mut self) -> StartOutcome;

    /// Finish the work. Runs exactly once per started item.
    fn end_work(&mut self);

    /// Called instead of start/finish when the item waited past its deadline.
    fn on_start_work_timed_out(&mut self) {}

    /// Called when admission control rejected the item.
    fn on_enqueue_failed(&mut self, _reason: EnqueueError) {}
}

impl fmt::Debug for dyn JobItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobItem").field("desc", &self.desc()).finish()
    }
}

/// Admission bookkeeping for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub seq: JobSeq,
    pub enqueued_at: Instant,
    pub deadline: Option<Instant>,
}

impl Ticket {
    /// Time left before the deadline, clamped at zero. `None` if unbounded.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Check whether the deadline has elapsed at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.remaining(now) == Some(Duration::ZERO)
    }
}

/// A job that has not been started.
pub struct QueuedJob {
    ticket: Ticket,
    item: Box<dyn JobItem>,
}

impl QueuedJob {
    /// Wrap an item, assigning its sequence number.
    pub fn new(item: Box<dyn JobItem>) -> Self {
        let now = Instant::now();
        Self {
            ticket: Ticket {
                seq: JobSeq::next(),
                enqueued_at: now,
                deadline: None,
            },
            item,
        }
    }

    /// Stamp the admission time and compute the deadline.
    ///
    /// The item's own timeout wins over `default_timeout`.
    pub fn stamp(&mut self, now: Instant, default_timeout: Option<Duration>) {
        let timeout = self.item.work_timeout().or(default_timeout);
        self.ticket.enqueued_at = now;
        self.ticket.deadline = timeout.and_then(|t| now.checked_add(t));
    }

    pub fn seq(&self) -> JobSeq {
        self.ticket.seq
    }

    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    pub fn desc(&self) -> &str {
        self.item.desc()
    }

    /// Run the start routine, and the finish routine too if the start
    /// completed synchronously.
    pub fn start(mut self) -> Started {
        match self.item.start_work() {
            StartOutcome::Completed => {
                self.item.end_work();
                Started::Completed(FinishedJob {
                    seq: self.ticket.seq,
                    state: JobState::CompletedSync,
                })
            }
            StartOutcome::Pending(signal) => Started::Pending(
                PendingJob {
                    ticket: self.ticket,
                    item: self.item,
                },
                signal,
            ),
        }
    }

    /// Evict the job without starting it.
    pub fn time_out(mut self) -> FinishedJob {
        self.item.on_start_work_timed_out();
        FinishedJob {
            seq: self.ticket.seq,
            state: JobState::TimedOut,
        }
    }

    /// Hand the job back to its owner after a failed admission.
    pub fn reject(mut self, reason: EnqueueError) {
        if reason == EnqueueError::QueueFull {
            self.item.on_enqueue_failed(reason);
        }
    }
}

impl fmt::Debug for QueuedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedJob")
            .field("seq", &self.ticket.seq)
            .field("desc", &self.item.desc())
            .finish()
    }
}

/// Result of starting a job.
#[derive(Debug)]
pub enum Started {
    Completed(FinishedJob),
    Pending(PendingJob, ReadySignal),
}

/// A job whose start routine returned without completing.
pub struct PendingJob {
    ticket: Ticket,
    item: Box<dyn JobItem>,
}

impl PendingJob {
    pub fn seq(&self) -> JobSeq {
        self.ticket.seq
    }

    pub fn desc(&self) -> &str {
        self.item.desc()
    }

    /// Run the finish routine.
    pub fn finish(mut self) -> FinishedJob {
        self.item.end_work();
        FinishedJob {
            seq: self.ticket.seq,
            state: JobState::CompletedAsync,
        }
    }
}

impl fmt::Debug for PendingJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingJob")
            .field("seq", &self.ticket.seq)
            .field("desc", &self.item.desc())
            .finish()
    }
}

/// Terminal record of a job; the item itself has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishedJob {
    pub seq: JobSeq,
    pub state: JobState,
}
