//! Worker identity, lifecycle state and counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a worker process, used in logs and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub Ulid);

impl WorkerId {
    /// Create a new unique worker ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the worker loop currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Blocked on the broker pop.
    #[default]
    Idle,
    /// Decoding and dispatching a popped job.
    Processing,
    /// Pushing the job result.
    Publishing,
    /// A pop timed out or the broker failed; returns to idle.
    Recovering,
    /// Job limit reached; terminal.
    Drained,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Drained)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "idle"),
            WorkerState::Processing => write!(f, "processing"),
            WorkerState::Publishing => write!(f, "publishing"),
            WorkerState::Recovering => write!(f, "recovering"),
            WorkerState::Drained => write!(f, "drained"),
        }
    }
}

/// Resident memory of this process in bytes, when the platform reports it.
pub fn resident_memory() -> Option<u64> {
    memory_stats::memory_stats().map(|usage| usage.physical_mem as u64)
}

/// Counters for a worker's lifetime.
///
/// Published after every state change, so `state` tracks the loop as it
/// moves through a cycle and ends at `Drained`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub worker_id: WorkerId,
    pub state: WorkerState,
    /// Completed decode, dispatch and publish cycles.
    pub processed: u64,
    /// Of `processed`, cycles whose published result was a failure.
    pub failed: u64,
    /// Pop timeouts and broker errors.
    pub recoveries: u64,
    /// Popped payloads that produced no published result.
    pub dropped: u64,
    /// Resident memory at the last sample.
    pub resident_memory_bytes: Option<u64>,
    pub started_at: DateTime<Utc>,
}

impl WorkerStats {
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            state: WorkerState::Idle,
            processed: 0,
            failed: 0,
            recoveries: 0,
            dropped: 0,
            resident_memory_bytes: resident_memory(),
            started_at: Utc::now(),
        }
    }

    /// Refresh `resident_memory_bytes`.
    pub fn sample_memory(&mut self) {
        self.resident_memory_bytes = resident_memory();
    }

    /// Last memory sample in whole mebibytes, for log lines.
    pub fn memory_usage(&self) -> String {
        match self.resident_memory_bytes {
            Some(bytes) => format!("{}M", (bytes + (1 << 19)) >> 20),
            None => "unknown".to_string(),
        }
    }

    /// Jobs processed per minute since start.
    pub fn throughput_per_min(&self) -> Option<f64> {
        let elapsed = (Utc::now() - self.started_at).num_milliseconds();
        if elapsed <= 0 || self.processed == 0 {
            None
        } else {
            Some(self.processed as f64 * 60_000.0 / elapsed as f64)
        }
    }
}
