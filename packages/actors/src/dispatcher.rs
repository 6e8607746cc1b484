//! Resolves a job's operation and runs it under the job's environment.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::Value;
use xrender_core::JobDescriptor;

use crate::handler::{Arity, Invocation, OperationRegistry};

/// Reasons a dispatched job produced no output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Operation {operation} takes {expected} argument(s), got {given}")]
    InvalidArguments {
        operation: String,
        expected: Arity,
        given: usize,
    },

    #[error("Operation {operation} failed: {cause}")]
    Failed { operation: String, cause: String },

    #[error("Operation {operation} panicked: {message}")]
    Panicked { operation: String, message: String },

    #[error("Operation {operation} timed out after {}s", .timeout.as_secs())]
    TimedOut {
        operation: String,
        timeout: Duration,
    },
}

/// Operation dispatcher.
///
/// Every dispatch builds a fresh [`Invocation`] from the job, so the acting
/// user, request path and session of one job never reach another.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<OperationRegistry>,
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Fail operations that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Operations this dispatcher can resolve.
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Run the job's operation and render its output as text.
    pub async fn dispatch(&self, job: JobDescriptor) -> Result<String, OperationError> {
        let operation = self
            .registry
            .get(&job.operation)
            .ok_or_else(|| OperationError::UnknownOperation(job.operation.clone()))?;

        let expected = operation.arity();
        if !expected.accepts(job.arguments.len()) {
            return Err(OperationError::InvalidArguments {
                operation: job.operation,
                expected,
                given: job.arguments.len(),
            });
        }

        let name = job.operation.clone();
        let invocation = Invocation::for_job(job);

        let call = std::panic::catch_unwind(AssertUnwindSafe(|| operation.invoke(invocation)))
            .map_err(|panic| OperationError::Panicked {
                operation: name.clone(),
                message: panic_message(panic.as_ref()),
            })?;
        let call = AssertUnwindSafe(call).catch_unwind();

        let finished = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, call).await.map_err(|_| {
                OperationError::TimedOut {
                    operation: name.clone(),
                    timeout,
                }
            })?,
            None => call.await,
        };

        let value = finished
            .map_err(|panic| OperationError::Panicked {
                operation: name.clone(),
                message: panic_message(panic.as_ref()),
            })?
            .map_err(|cause| OperationError::Failed {
                operation: name,
                cause,
            })?;

        Ok(render(value))
    }
}

/// Strings are published verbatim, `null` as nothing, anything else as JSON.
fn render(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
