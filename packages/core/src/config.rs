//! Worker loop configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the worker loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Jobs served before the worker drains and exits.
    pub max_jobs_per_process: u64,
    /// Blocking pop window in seconds; 0 blocks until a job arrives.
    pub pop_timeout_secs: u64,
    /// Pause after a broker error before polling again (milliseconds).
    pub recovery_delay_ms: u64,
    /// Upper bound on a single operation; unbounded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_timeout_secs: Option<u64>,
    /// Push attempts for one result before it is dropped.
    pub publish_attempts: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_jobs_per_process: 1000,
            pop_timeout_secs: 5,
            recovery_delay_ms: 1000,
            operation_timeout_secs: None,
            publish_attempts: 3,
        }
    }
}

impl WorkerConfig {
    /// Set the number of jobs served before draining.
    pub fn with_max_jobs(mut self, max_jobs: u64) -> Self {
        self.max_jobs_per_process = max_jobs;
        self
    }

    /// Set the blocking pop window.
    pub fn with_pop_timeout(mut self, secs: u64) -> Self {
        self.pop_timeout_secs = secs;
        self
    }

    /// Set the pause after broker errors.
    pub fn with_recovery_delay(mut self, delay: Duration) -> Self {
        self.recovery_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Bound every operation by a timeout.
    pub fn with_operation_timeout(mut self, secs: u64) -> Self {
        self.operation_timeout_secs = Some(secs);
        self
    }

    pub fn pop_timeout(&self) -> Duration {
        Duration::from_secs(self.pop_timeout_secs)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs.map(Duration::from_secs)
    }

    /// Push attempts, never less than one.
    pub fn publish_attempts(&self) -> u32 {
        self.publish_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_jobs_per_process, 1000);
        assert_eq!(config.pop_timeout(), Duration::from_secs(5));
        assert_eq!(config.operation_timeout(), None);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: WorkerConfig =
            serde_json::from_str(r#"{"max_jobs_per_process": 10, "publish_attempts": 0}"#)
                .expect("config");
        assert_eq!(config.max_jobs_per_process, 10);
        assert_eq!(config.recovery_delay(), Duration::from_secs(1));
        assert_eq!(config.publish_attempts(), 1);
    }
}
