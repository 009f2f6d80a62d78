//! Error types surfaced by the queue domain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason an enqueue was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueError {
    /// Admitting the item would exceed the queue's capacity.
    #[error("job queue is full")]
    QueueFull,
    /// The queue is closing or closed.
    #[error("job queue is closed")]
    ObjectClosed,
}

/// Invalid queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("failed to parse queue config: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}
