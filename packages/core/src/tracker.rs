//! Accounting for started work.

use std::collections::VecDeque;

use crate::job::PendingJob;

/// Counts work owned by workers and holds jobs ready to finish.
#[derive(Debug)]
pub struct InFlightTracker {
    max_parallel: usize,
    pending_process: usize,
    async_ready: VecDeque<PendingJob>,
}

impl InFlightTracker {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel,
            pending_process: 0,
            async_ready: VecDeque::new(),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Jobs being started, waiting on their async phase, or being finished.
    pub fn pending_process(&self) -> usize {
        self.pending_process
    }

    /// Jobs signalled ready and waiting for a worker.
    pub fn async_ready(&self) -> usize {
        self.async_ready.len()
    }

    /// Total in-flight work.
    pub fn in_flight(&self) -> usize {
        self.pending_process + self.async_ready.len()
    }

    /// Check whether a brand-new job may be started.
    pub fn can_start_new(&self) -> bool {
        self.in_flight() < self.max_parallel
    }

    pub fn has_ready(&self) -> bool {
        !self.async_ready.is_empty()
    }

    /// A worker took a new job to start.
    pub fn begin_start(&mut self) {
        assert!(
            self.can_start_new(),
            "started a job past the parallel work limit of {}",
            self.max_parallel
        );
        self.pending_process += 1;
    }

    /// A job's async phase completed; park it until a worker finishes it.
    pub fn on_async_ready(&mut self, job: PendingJob) {
        self.release_process();
        self.async_ready.push_back(job);
    }

    /// Hand the oldest ready job to a worker.
    pub fn take_ready(&mut self) -> Option<PendingJob> {
        let job = self.async_ready.pop_front()?;
        self.pending_process += 1;
        Some(job)
    }

    /// A worker is done with a job, whether finished or aborted.
    pub fn release_process(&mut self) {
        self.pending_process = self
            .pending_process
            .checked_sub(1)
            .unwrap_or_else(|| panic!("pending-process count underflow"));
    }
}
