//! Test helpers shared by the unit tests.

use std::time::{Duration, Instant};

use crate::job::{JobItem, QueuedJob, StartOutcome};

/// Job that completes synchronously and does nothing.
pub struct Noop;

impl Noop {
    pub fn boxed() -> Box<dyn JobItem> {
        Box::new(Noop)
    }
}

impl JobItem for Noop {
    fn desc(&self) -> &str {
        "noop"
    }

    fn start_work(&mut self) -> StartOutcome {
        StartOutcome::Completed
    }

    fn end_work(&mut self) {}
}

/// Wrap and stamp an item as if admitted at `now`.
pub fn queued(item: Box<dyn JobItem>, now: Instant, timeout: Option<Duration>) -> QueuedJob {
    let mut job = QueuedJob::new(item);
    job.stamp(now, timeout);
    job
}
