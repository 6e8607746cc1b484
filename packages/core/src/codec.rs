//! Wire codec for job descriptors.
//!
//! Jobs travel as UTF-8 JSON objects:
//!
//! ```json
//! {
//!   "id": "42",
//!   "operation": "echo",
//!   "arguments": ["hi"],
//!   "environment": { "actingUser": null, "requestPath": "node/1", "sessionData": {} }
//! }
//! ```
//!
//! Decoding is all-or-nothing. When a payload is rejected, the job id is
//! still recovered if the payload was a JSON object with a usable `id`, so
//! the submitter waiting on the output list can be answered.

use serde_json::Value;

use crate::job::{JobDescriptor, JobId};

/// Error returned for a payload that is not a valid job descriptor.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Not JSON at all.
    #[error("job payload is not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    /// JSON, but not shaped like a job descriptor.
    #[error("invalid job descriptor: {reason}")]
    Shape {
        reason: String,
        recovered_id: Option<JobId>,
    },
}

impl DecodeError {
    /// The job id, if it could be read from the rejected payload.
    pub fn recovered_id(&self) -> Option<&JobId> {
        match self {
            DecodeError::Syntax(_) => None,
            DecodeError::Shape { recovered_id, .. } => recovered_id.as_ref(),
        }
    }
}

/// Decode a raw payload popped from the input list.
pub fn decode(raw: &[u8]) -> Result<JobDescriptor, DecodeError> {
    let value: Value = serde_json::from_slice(raw).map_err(DecodeError::Syntax)?;
    let recovered_id = recover_id(&value);

    let job: JobDescriptor =
        serde_json::from_value(value).map_err(|e| DecodeError::Shape {
            reason: e.to_string(),
            recovered_id: recovered_id.clone(),
        })?;

    if job.operation.trim().is_empty() {
        return Err(DecodeError::Shape {
            reason: "operation must not be empty".to_string(),
            recovered_id: Some(job.id),
        });
    }

    Ok(job)
}

/// Encode a job descriptor in the canonical wire format.
pub fn encode(job: &JobDescriptor) -> Vec<u8> {
    // Every field serializes infallibly: string keys, JSON values.
    serde_json::to_vec(job).unwrap_or_default()
}

fn recover_id(value: &Value) -> Option<JobId> {
    let text = match value.get("id")? {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    JobId::parse(&text).ok()
}
