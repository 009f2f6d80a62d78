//! Dequeue policies deciding which pending job a free worker serves next.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::job::QueuedJob;

/// Strategy selecting the next pending job.
///
/// `pending` is ordered by admission, oldest first. Expired entries have
/// already been removed when this is called.
pub trait DequeuePolicy: Send + Sync + fmt::Debug + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Index of the job to serve next, or `None` when `pending` is empty.
    fn select(&self, pending: &[QueuedJob]) -> Option<usize>;
}

/// Oldest admitted job first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl DequeuePolicy for Fifo {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn select(&self, pending: &[QueuedJob]) -> Option<usize> {
        if pending.is_empty() { None } else { Some(0) }
    }
}

/// Newest admitted job first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lifo;

impl DequeuePolicy for Lifo {
    fn name(&self) -> &'static str {
        "lifo"
    }

    fn select(&self, pending: &[QueuedJob]) -> Option<usize> {
        pending.len().checked_sub(1)
    }
}

/// Soonest deadline first; unbounded jobs go last, ties by admission.
#[derive(Debug, Clone, Copy, Default)]
pub struct EarliestDeadline;

impl DequeuePolicy for EarliestDeadline {
    fn name(&self) -> &'static str {
        "earliest_deadline"
    }

    fn select(&self, pending: &[QueuedJob]) -> Option<usize> {
        pending
            .iter()
            .enumerate()
            .min_by_key(|(idx, job)| (job.ticket().deadline.is_none(), job.ticket().deadline, *idx))
            .map(|(idx, _)| idx)
    }
}

/// Configurable selection of a built-in policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DequeueOrder {
    #[default]
    Fifo,
    Lifo,
    EarliestDeadline,
}

impl DequeueOrder {
    /// Build the policy object for this order.
    pub fn policy(self) -> Arc<dyn DequeuePolicy> {
        match self {
            DequeueOrder::Fifo => Arc::new(Fifo),
            DequeueOrder::Lifo => Arc::new(Lifo),
            DequeueOrder::EarliestDeadline => Arc::new(EarliestDeadline),
        }
    }
}

impl fmt::Display for DequeueOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DequeueOrder::Fifo => write!(f, "fifo"),
            DequeueOrder::Lifo => write!(f, "lifo"),
            DequeueOrder::EarliestDeadline => write!(f, "earliest_deadline"),
        }
    }
}
