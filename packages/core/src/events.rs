//! Lifecycle events emitted by the worker loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FailureKind, JobId, WorkerId};

/// Events emitted by a worker for operational visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// The worker started polling its input list.
    Ready {
        worker_id: WorkerId,
        input_list: String,
        timestamp: DateTime<Utc>,
    },
    /// A job was popped and decoded.
    JobReceived {
        job_id: JobId,
        operation: String,
        timestamp: DateTime<Utc>,
    },
    /// A successful result was published.
    JobCompleted {
        job_id: JobId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A failure result was published.
    JobFailed {
        job_id: JobId,
        kind: FailureKind,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// A popped payload could not be answered.
    JobDropped {
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// A pop timed out (`error` is `None`) or the broker failed.
    BrokerRecovered {
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// The result could not be pushed after every attempt.
    PublishFailed {
        job_id: JobId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// The job limit was reached and the worker stopped.
    Drained {
        worker_id: WorkerId,
        processed: u64,
        timestamp: DateTime<Utc>,
    },
}

impl WorkerEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            WorkerEvent::Ready { timestamp, .. } => *timestamp,
            WorkerEvent::JobReceived { timestamp, .. } => *timestamp,
            WorkerEvent::JobCompleted { timestamp, .. } => *timestamp,
            WorkerEvent::JobFailed { timestamp, .. } => *timestamp,
            WorkerEvent::JobDropped { timestamp, .. } => *timestamp,
            WorkerEvent::BrokerRecovered { timestamp, .. } => *timestamp,
            WorkerEvent::PublishFailed { timestamp, .. } => *timestamp,
            WorkerEvent::Drained { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            WorkerEvent::JobReceived { job_id, .. } => Some(job_id),
            WorkerEvent::JobCompleted { job_id, .. } => Some(job_id),
            WorkerEvent::JobFailed { job_id, .. } => Some(job_id),
            WorkerEvent::PublishFailed { job_id, .. } => Some(job_id),
            _ => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            WorkerEvent::Ready {
                worker_id,
                input_list,
                ..
            } => format!("Worker {} ready on {}", worker_id, input_list),
            WorkerEvent::JobReceived {
                job_id, operation, ..
            } => format!("Job {} received ({})", job_id, operation),
            WorkerEvent::JobCompleted {
                job_id,
                duration_ms,
                ..
            } => format!("Job {} completed in {}ms", job_id, duration_ms),
            WorkerEvent::JobFailed {
                job_id, kind, error, ..
            } => format!("Job {} failed ({}): {}", job_id, kind, error),
            WorkerEvent::JobDropped { reason, .. } => format!("Job dropped: {}", reason),
            WorkerEvent::BrokerRecovered { error, .. } => match error {
                Some(error) => format!("Broker error: {}", error),
                None => "Pop timed out".to_string(),
            },
            WorkerEvent::PublishFailed { job_id, error, .. } => {
                format!("Result of job {} not published: {}", job_id, error)
            }
            WorkerEvent::Drained {
                worker_id,
                processed,
                ..
            } => format!("Worker {} drained after {} jobs", worker_id, processed),
        }
    }
}
