//! All mutable scheduling state of one queue, and its transitions.
//!
//! [`SchedulerState`] composes the pending set, the in-flight tracker and
//! the worker count so that cross-structure invariants are updated in a
//! single step. It is owned by exactly one party (the queue actor); every
//! public method is one atomic transition and never calls into a job item.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::QueueConfig;
use crate::error::EnqueueError;
use crate::job::{FinishedJob, JobSeq, JobState, PendingJob, QueuedJob};
use crate::pending::PendingSet;
use crate::policy::DequeuePolicy;
use crate::queue::{QueueState, QueueStats};
use crate::tracker::InFlightTracker;

/// What a worker should do next.
#[derive(Debug)]
pub enum Work {
    /// Run the start routine of a pending job.
    Start(QueuedJob),
    /// Run the finish routine of a job whose async phase completed.
    Finish(PendingJob),
    /// Nothing to do; the worker has been released and must stop.
    Exit,
}

/// A worker's next step plus any jobs evicted while choosing it.
#[derive(Debug)]
pub struct Step {
    pub work: Work,
    pub expired: Vec<QueuedJob>,
}

/// A successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admitted {
    pub seq: JobSeq,
    /// A worker slot was claimed and a worker must be spawned.
    pub wake_worker: bool,
}

/// A refused admission, handing the job back.
#[derive(Debug)]
pub struct Rejection {
    pub reason: EnqueueError,
    pub job: QueuedJob,
}

/// Counters and collections of a single queue.
#[derive(Debug)]
pub struct SchedulerState {
    state: QueueState,
    max_threads: usize,
    max_queue_size: usize,
    default_timeout: Option<Duration>,
    pending: PendingSet,
    in_flight: InFlightTracker,
    active_workers: usize,
    /// Evicted jobs whose timeout hook is still running.
    evicting: usize,
    enqueued: u64,
    rejected: u64,
    completed_sync: u64,
    completed_async: u64,
    timed_out: u64,
    aborted: u64,
}

impl SchedulerState {
    pub fn new(config: &QueueConfig, policy: Arc<dyn DequeuePolicy>) -> Self {
        Self {
            state: QueueState::Open,
            max_threads: config.max_threads,
            max_queue_size: config.max_queue_size,
            default_timeout: config.default_work_timeout(),
            pending: PendingSet::new(policy),
            in_flight: InFlightTracker::new(config.max_parallel_pending_work_count),
            active_workers: 0,
            evicting: 0,
            enqueued: 0,
            rejected: 0,
            completed_sync: 0,
            completed_async: 0,
            timed_out: 0,
            aborted: 0,
        }
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn policy_name(&self) -> &'static str {
        self.pending.policy().name()
    }

    pub fn active_workers(&self) -> usize {
        self.active_workers
    }

    fn occupancy(&self) -> usize {
        self.pending.len() + self.in_flight.in_flight()
    }

    /// Admission control.
    pub fn admit(&mut self, mut job: QueuedJob, now: Instant) -> Result<Admitted, Rejection> {
        if !self.state.is_accepting_jobs() {
            return Err(Rejection {
                reason: EnqueueError::ObjectClosed,
                job,
            });
        }
        if self.occupancy() >= self.max_queue_size {
            self.rejected += 1;
            return Err(Rejection {
                reason: EnqueueError::QueueFull,
                job,
            });
        }

        job.stamp(now, self.default_timeout);
        let seq = job.seq();
        self.pending.push(job);
        self.enqueued += 1;

        Ok(Admitted {
            seq,
            wake_worker: self.try_claim_worker(),
        })
    }

    /// Check whether an idle worker would find something to do.
    pub fn has_startable_work(&self) -> bool {
        self.in_flight.has_ready() || (!self.pending.is_empty() && self.in_flight.can_start_new())
    }

    /// Reserve a worker slot if one is free and there is work for it.
    ///
    /// Returns `true` when the caller must spawn a worker.
    pub fn try_claim_worker(&mut self) -> bool {
        if self.active_workers < self.max_threads && self.has_startable_work() {
            self.active_workers += 1;
            true
        } else {
            false
        }
    }

    /// Give a worker slot back.
    pub fn release_worker(&mut self) {
        self.active_workers = self
            .active_workers
            .checked_sub(1)
            .unwrap_or_else(|| panic!("active worker count underflow"));
    }

    /// Choose the next step for a worker asking for work.
    ///
    /// Ready jobs are preferred. A new job is only taken while the
    /// parallel work limit allows it. When nothing qualifies the worker's
    /// slot is released in the same transition.
    pub fn next_work(&mut self, now: Instant) -> Step {
        if let Some(job) = self.in_flight.take_ready() {
            return Step {
                work: Work::Finish(job),
                expired: Vec::new(),
            };
        }

        let mut expired = Vec::new();
        if self.in_flight.can_start_new() {
            let dequeued = self.pending.try_dequeue(now);
            expired = dequeued.expired;
            self.note_evicted(expired.len());
            if let Some(job) = dequeued.job {
                self.in_flight.begin_start();
                return Step {
                    work: Work::Start(job),
                    expired,
                };
            }
        }

        self.release_worker();
        Step {
            work: Work::Exit,
            expired,
        }
    }

    /// Periodic deadline sweep of the pending set.
    pub fn sweep(&mut self, now: Instant) -> Vec<QueuedJob> {
        let expired = self.pending.sweep_expired(now);
        self.note_evicted(expired.len());
        expired
    }

    fn note_evicted(&mut self, count: usize) {
        self.evicting += count;
        self.timed_out += count as u64;
    }

    /// The timeout hook of an evicted job returned.
    pub fn timeout_handled(&mut self) {
        self.evicting = self
            .evicting
            .checked_sub(1)
            .unwrap_or_else(|| panic!("evicting count underflow"));
    }

    /// A job's async phase completed.
    ///
    /// Returns `true` when the caller must spawn a worker to finish it.
    pub fn async_ready(&mut self, job: PendingJob) -> bool {
        self.in_flight.on_async_ready(job);
        self.try_claim_worker()
    }

    /// A worker finished a job.
    pub fn complete(&mut self, done: &FinishedJob) {
        self.in_flight.release_process();
        match done.state {
            JobState::CompletedSync => self.completed_sync += 1,
            JobState::CompletedAsync => self.completed_async += 1,
            state => panic!("job {} reported complete in state {state}", done.seq),
        }
    }

    /// A job's routine panicked on a worker.
    pub fn abort(&mut self) {
        self.in_flight.release_process();
        self.aborted += 1;
    }

    /// Stop admitting jobs. Returns the state after the transition.
    pub fn begin_close(&mut self) -> QueueState {
        if self.state == QueueState::Open {
            self.state = QueueState::Closing;
        }
        self.try_finish_close();
        self.state
    }

    /// Move from closing to closed once drained. Returns `true` on the
    /// transition itself, so it is observed exactly once.
    pub fn try_finish_close(&mut self) -> bool {
        if self.state == QueueState::Closing && self.is_drained() {
            self.state = QueueState::Closed;
            true
        } else {
            false
        }
    }

    /// Check that no admitted job is still outstanding.
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.in_flight.in_flight() == 0 && self.evicting == 0
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            max_threads: self.max_threads,
            max_queue_size: self.max_queue_size,
            max_parallel_pending_work_count: self.in_flight.max_parallel(),
            active_workers: self.active_workers,
            pending: self.pending.len(),
            async_ready: self.in_flight.async_ready(),
            pending_process: self.in_flight.pending_process(),
            enqueued: self.enqueued,
            rejected: self.rejected,
            completed_sync: self.completed_sync,
            completed_async: self.completed_async,
            timed_out: self.timed_out,
            aborted: self.aborted,
        }
    }
}
