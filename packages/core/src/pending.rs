//! Jobs admitted but not yet started.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crate::job::QueuedJob;
use crate::policy::DequeuePolicy;

/// Outcome of [`PendingSet::try_dequeue`].
#[derive(Debug, Default)]
pub struct Dequeued {
    /// The job to start, if any was eligible.
    pub job: Option<QueuedJob>,
    /// Jobs found past their deadline during selection.
    pub expired: Vec<QueuedJob>,
}

/// Ordered collection of not-yet-started jobs.
#[derive(Debug)]
pub struct PendingSet {
    entries: VecDeque<QueuedJob>,
    policy: Arc<dyn DequeuePolicy>,
}

impl PendingSet {
    pub fn new(policy: Arc<dyn DequeuePolicy>) -> Self {
        Self {
            entries: VecDeque::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &dyn DequeuePolicy {
        self.policy.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a job in admission order.
    pub fn push(&mut self, job: QueuedJob) {
        self.entries.push_back(job);
    }

    /// Remove the next eligible job per policy.
    ///
    /// Every job whose deadline has elapsed at `now` is removed as well and
    /// returned in `expired`, so it is never handed out.
    pub fn try_dequeue(&mut self, now: Instant) -> Dequeued {
        let expired = self.sweep_expired(now);
        let job = self
            .policy
            .select(self.entries.make_contiguous())
            .and_then(|idx| self.entries.remove(idx));
        Dequeued { job, expired }
    }

    /// Remove and return every job whose deadline has elapsed at `now`.
    pub fn sweep_expired(&mut self, now: Instant) -> Vec<QueuedJob> {
        match self.next_deadline() {
            Some(deadline) if deadline <= now => {}
            _ => return Vec::new(),
        }

        let (expired, live): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|job| job.ticket().is_expired(now));
        self.entries = live.into();
        expired
    }

    /// Earliest deadline among pending jobs.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter_map(|job| job.ticket().deadline)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobSeq;
    use crate::policy::{DequeueOrder, EarliestDeadline, Fifo, Lifo};
    use crate::testing::{Noop, queued};
    use std::time::Duration;

    fn set_with(policy: Arc<dyn DequeuePolicy>, jobs: Vec<QueuedJob>) -> (PendingSet, Vec<JobSeq>) {
        let mut set = PendingSet::new(policy);
        let seqs = jobs.iter().map(QueuedJob::seq).collect();
        for job in jobs {
            set.push(job);
        }
        (set, seqs)
    }

    fn drain_order(set: &mut PendingSet, now: Instant) -> Vec<JobSeq> {
        let mut order = Vec::new();
        while let Some(job) = set.try_dequeue(now).job {
            order.push(job.seq());
        }
        order
    }

    #[test]
    fn fifo_serves_oldest_first() {
        let now = Instant::now();
        let jobs = (0..4).map(|_| queued(Noop::boxed(), now, None)).collect();
        let (mut set, seqs) = set_with(Arc::new(Fifo), jobs);

        assert_eq!(set.len(), 4);
        assert_eq!(drain_order(&mut set, now), seqs);
        assert!(set.is_empty());
    }

    #[test]
    fn lifo_serves_newest_first() {
        let now = Instant::now();
        let jobs = (0..4).map(|_| queued(Noop::boxed(), now, None)).collect();
        let (mut set, mut seqs) = set_with(Arc::new(Lifo), jobs);

        seqs.reverse();
        assert_eq!(drain_order(&mut set, now), seqs);
    }

    #[test]
    fn earliest_deadline_puts_unbounded_last() {
        let now = Instant::now();
        let jobs = vec![
            queued(Noop::boxed(), now, None),
            queued(Noop::boxed(), now, Some(Duration::from_secs(30))),
            queued(Noop::boxed(), now, Some(Duration::from_secs(10))),
            queued(Noop::boxed(), now, Some(Duration::from_secs(10))),
        ];
        let (mut set, seqs) = set_with(Arc::new(EarliestDeadline), jobs);

        assert_eq!(set.next_deadline(), Some(now + Duration::from_secs(10)));
        assert_eq!(
            drain_order(&mut set, now),
            vec![seqs[2], seqs[3], seqs[1], seqs[0]]
        );
    }

    #[test]
    fn dequeue_skips_and_returns_expired() {
        let now = Instant::now();
        let jobs = vec![
            queued(Noop::boxed(), now, Some(Duration::from_millis(10))),
            queued(Noop::boxed(), now, None),
            queued(Noop::boxed(), now, Some(Duration::from_millis(10))),
        ];
        let (mut set, seqs) = set_with(DequeueOrder::Fifo.policy(), jobs);

        let later = now + Duration::from_millis(20);
        let dequeued = set.try_dequeue(later);
        assert_eq!(dequeued.job.map(|j| j.seq()), Some(seqs[1]));
        let expired: Vec<_> = dequeued.expired.iter().map(QueuedJob::seq).collect();
        assert_eq!(expired, vec![seqs[0], seqs[2]]);
        assert!(set.is_empty());
    }

    #[test]
    fn sweep_keeps_live_jobs_in_order() {
        let now = Instant::now();
        let jobs = vec![
            queued(Noop::boxed(), now, None),
            queued(Noop::boxed(), now, Some(Duration::from_secs(1))),
            queued(Noop::boxed(), now, Some(Duration::from_secs(60))),
            queued(Noop::boxed(), now, None),
        ];
        let (mut set, seqs) = set_with(Arc::new(Fifo), jobs);

        assert!(set.sweep_expired(now).is_empty());
        let expired = set.sweep_expired(now + Duration::from_secs(2));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].seq(), seqs[1]);
        assert_eq!(
            drain_order(&mut set, now + Duration::from_secs(2)),
            vec![seqs[0], seqs[2], seqs[3]]
        );
    }

    #[test]
    fn sweep_before_earliest_deadline_keeps_everything() {
        let now = Instant::now();
        let jobs = vec![
            queued(Noop::boxed(), now, None),
            queued(Noop::boxed(), now, Some(Duration::from_secs(60))),
            queued(Noop::boxed(), now, Some(Duration::from_secs(5))),
        ];
        let (mut set, seqs) = set_with(Arc::new(Fifo), jobs);

        assert_eq!(set.next_deadline(), Some(now + Duration::from_secs(5)));
        assert!(set.sweep_expired(now + Duration::from_secs(4)).is_empty());
        assert_eq!(set.len(), 3);

        // Due exactly at the deadline.
        let expired = set.sweep_expired(now + Duration::from_secs(5));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].seq(), seqs[2]);
        assert_eq!(set.next_deadline(), Some(now + Duration::from_secs(60)));
    }

    #[test]
    fn sweep_without_deadlines_is_a_no_op() {
        let now = Instant::now();
        let jobs = (0..3).map(|_| queued(Noop::boxed(), now, None)).collect();
        let (mut set, seqs) = set_with(Arc::new(Fifo), jobs);

        assert_eq!(set.next_deadline(), None);
        assert!(set.sweep_expired(now + Duration::from_secs(3600)).is_empty());
        assert_eq!(drain_order(&mut set, now), seqs);
    }

    #[test]
    fn zero_timeout_expires_immediately() {
        let now = Instant::now();
        let (mut set, _) = set_with(
            Arc::new(Fifo),
            vec![queued(Noop::boxed(), now, Some(Duration::ZERO))],
        );

        let dequeued = set.try_dequeue(now);
        assert!(dequeued.job.is_none());
        assert_eq!(dequeued.expired.len(), 1);
    }
}
