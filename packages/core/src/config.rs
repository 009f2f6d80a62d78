//! Queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::policy::DequeueOrder;

/// Limits and behavior of a job queue.
///
/// Usually deserialized from whatever configuration source the owner
/// uses; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Name used in logs.
    pub name: String,
    /// Maximum number of concurrently alive workers.
    pub max_threads: usize,
    /// Maximum pending + pending-process + async-ready jobs.
    pub max_queue_size: usize,
    /// Maximum pending-process + async-ready jobs.
    pub max_parallel_pending_work_count: usize,
    /// Log every worker step.
    pub trace_processing_threads: bool,
    /// Order in which pending jobs are served.
    pub dequeue_order: DequeueOrder,
    /// Deadline for jobs that don't set their own (milliseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_work_timeout_ms: Option<u64>,
    /// How often pending jobs are swept for expired deadlines (milliseconds).
    pub sweep_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "job-queue".to_string(),
            max_threads: 4,
            max_queue_size: 1024,
            max_parallel_pending_work_count: 1024,
            trace_processing_threads: false,
            dequeue_order: DequeueOrder::Fifo,
            default_work_timeout_ms: None,
            sweep_interval_ms: 100,
        }
    }
}

impl QueueConfig {
    /// Create a config with the given name and default limits.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    pub fn with_max_parallel_pending_work_count(mut self, count: usize) -> Self {
        self.max_parallel_pending_work_count = count;
        self
    }

    pub fn with_trace_processing_threads(mut self, trace: bool) -> Self {
        self.trace_processing_threads = trace;
        self
    }

    pub fn with_dequeue_order(mut self, order: DequeueOrder) -> Self {
        self.dequeue_order = order;
        self
    }

    pub fn with_default_work_timeout(mut self, timeout: Duration) -> Self {
        self.default_work_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn default_work_timeout(&self) -> Option<Duration> {
        self.default_work_timeout_ms.map(Duration::from_millis)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Check that every limit is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("max_threads", self.max_threads as u64),
            ("max_queue_size", self.max_queue_size as u64),
            (
                "max_parallel_pending_work_count",
                self.max_parallel_pending_work_count as u64,
            ),
            ("sweep_interval_ms", self.sweep_interval_ms),
        ];
        for (field, value) in limits {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config = QueueConfig::from_json(
            r#"{"name":"activation","max_threads":2,"dequeue_order":"lifo"}"#,
        )
        .unwrap();

        assert_eq!(config.name, "activation");
        assert_eq!(config.max_threads, 2);
        assert_eq!(config.dequeue_order, DequeueOrder::Lifo);
        assert_eq!(config.max_queue_size, QueueConfig::default().max_queue_size);
        assert_eq!(config.default_work_timeout(), None);
    }

    #[test]
    fn rejects_zero_limits() {
        let err = QueueConfig::new("q").with_max_queue_size(0).validate().unwrap_err();
        assert_eq!(err, ConfigError::Zero { field: "max_queue_size" });

        let err = QueueConfig::from_json(r#"{"max_threads":0}"#).unwrap_err();
        assert_eq!(err, ConfigError::Zero { field: "max_threads" });
    }

    #[test]
    fn rejects_malformed_json() {
        let err = QueueConfig::from_json(r#"{"max_threads":"two"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn builder_round_trips_durations() {
        let config = QueueConfig::new("q")
            .with_default_work_timeout(Duration::from_secs(1))
            .with_sweep_interval(Duration::from_millis(25));

        assert_eq!(config.default_work_timeout(), Some(Duration::from_secs(1)));
        assert_eq!(config.sweep_interval(), Duration::from_millis(25));
        assert!(config.validate().is_ok());
    }
}
