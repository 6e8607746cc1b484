//! Job domain types for work items popped from the input list.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Opaque identifier chosen by the producer of a job.
///
/// It names the output list the result is pushed to, so it must be
/// non-empty and free of whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

/// Error returned when a string is not a usable job ID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidJobId {
    #[error("job id is empty")]
    Empty,
    #[error("job id {0:?} contains whitespace")]
    Whitespace(String),
}

impl JobId {
    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, InvalidJobId> {
        if s.is_empty() {
            return Err(InvalidJobId::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(InvalidJobId::Whitespace(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Producers may send the id as a JSON string or a JSON number.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawJobId {
    Text(String),
    Number(serde_json::Number),
}

impl RawJobId {
    fn into_text(self) -> String {
        match self {
            RawJobId::Text(text) => text,
            RawJobId::Number(number) => number.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = RawJobId::deserialize(deserializer)?.into_text();
        JobId::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Request-scoped state a job was submitted under.
///
/// Replayed into an [`ExecutionContext`](crate::ExecutionContext) before the
/// operation runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Environment {
    /// Identity of the acting user; `null` for anonymous requests.
    #[serde(alias = "user", alias = "acting_user")]
    pub acting_user: Value,
    /// Path of the request that enqueued the job.
    #[serde(
        alias = "path",
        alias = "request_path",
        deserialize_with = "string_or_null"
    )]
    pub request_path: String,
    /// Session values of the originating request.
    #[serde(
        alias = "session",
        alias = "session_data",
        deserialize_with = "session_map"
    )]
    pub session_data: BTreeMap<String, Value>,
}

impl Environment {
    pub fn new(acting_user: Value, request_path: impl Into<String>) -> Self {
        Self {
            acting_user,
            request_path: request_path.into(),
            session_data: BTreeMap::new(),
        }
    }

    /// Add a session value.
    pub fn with_session(mut self, key: impl Into<String>, value: Value) -> Self {
        self.session_data.insert(key.into(), value);
        self
    }
}

fn string_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// An empty PHP session serializes as `[]`, and a list-shaped one as an
/// array, so arrays are accepted and keyed by index.
fn session_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, Value>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSession {
        Map(BTreeMap<String, Value>),
        List(Vec<Value>),
        Null(()),
    }

    Ok(match RawSession::deserialize(deserializer)? {
        RawSession::Map(map) => map,
        RawSession::List(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, value)| (index.to_string(), value))
            .collect(),
        RawSession::Null(()) => BTreeMap::new(),
    })
}

/// A unit of deferred work: a named operation, its positional arguments
/// and the environment to replay while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Unique identifier, names the output list.
    pub id: JobId,
    /// Registered operation to invoke.
    #[serde(alias = "function")]
    pub operation: String,
    /// Arguments applied positionally.
    #[serde(default)]
    pub arguments: Vec<Value>,
    /// Replay environment.
    #[serde(default)]
    pub environment: Environment,
}

impl JobDescriptor {
    /// Create a job without arguments and with an anonymous environment.
    pub fn new(id: JobId, operation: impl Into<String>) -> Self {
        Self {
            id,
            operation: operation.into(),
            arguments: Vec::new(),
            environment: Environment::default(),
        }
    }

    /// Set the positional arguments for this job.
    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Set the replay environment for this job.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}

/// Which stage of handling a job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The popped payload could not be decoded.
    Decode,
    /// The operation could not be resolved or returned an error.
    Operation,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Decode => write!(f, "decode"),
            FailureKind::Operation => write!(f, "operation"),
        }
    }
}

/// What happened to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Rendered output of the operation.
    Success(String),
    /// Handled failure, reported to the submitter instead of the output.
    Failure { kind: FailureKind, message: String },
}

/// The single response published for a popped job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub job_id: JobId,
    pub outcome: Outcome,
}

impl JobResult {
    pub fn success(job_id: JobId, payload: impl Into<String>) -> Self {
        Self {
            job_id,
            outcome: Outcome::Success(payload.into()),
        }
    }

    pub fn failure(job_id: JobId, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            job_id,
            outcome: Outcome::Failure {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    /// Bytes pushed to the output list, newline terminated.
    ///
    /// Successful output is published as is; failures are wrapped in a
    /// JSON `{"error": {"kind", "message"}}` envelope.
    pub fn payload(&self) -> Vec<u8> {
        let mut payload = match &self.outcome {
            Outcome::Success(output) => output.clone(),
            Outcome::Failure { kind, message } => serde_json::json!({
                "error": { "kind": kind, "message": message }
            })
            .to_string(),
        };
        payload.push('\n');
        payload.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_id_rejects_empty_and_whitespace() {
        assert_eq!(JobId::parse(""), Err(InvalidJobId::Empty));
        assert!(matches!(
            JobId::parse("4 2"),
            Err(InvalidJobId::Whitespace(_))
        ));
        assert_eq!(JobId::parse("42").map(|id| id.to_string()), Ok("42".into()));
    }

    #[test]
    fn job_id_accepts_numbers() {
        let id: JobId = serde_json::from_value(json!(42)).expect("numeric id");
        assert_eq!(id.as_str(), "42");
    }

    #[test]
    fn environment_accepts_php_shapes() {
        let env: Environment = serde_json::from_value(json!({
            "user": { "uid": 7, "name": "editor" },
            "path": null,
            "session": []
        }))
        .expect("legacy environment");
        assert_eq!(env.acting_user["uid"], 7);
        assert_eq!(env.request_path, "");
        assert!(env.session_data.is_empty());

        let env: Environment = serde_json::from_value(json!({
            "actingUser": null,
            "requestPath": "node/1",
            "sessionData": ["a", "b"]
        }))
        .expect("canonical environment");
        assert_eq!(env.request_path, "node/1");
        assert_eq!(env.session_data.get("1"), Some(&json!("b")));
    }

    #[test]
    fn failure_payload_is_an_error_envelope() {
        let id = JobId::parse("9").expect("id");
        let result = JobResult::failure(id, FailureKind::Operation, "boom");
        let value: Value = serde_json::from_slice(&result.payload()).expect("json");
        assert_eq!(value, json!({ "error": { "kind": "operation", "message": "boom" } }));
        assert!(!result.is_success());
    }

    #[test]
    fn payloads_are_newline_terminated() {
        let id = JobId::parse("42").expect("id");
        assert_eq!(JobResult::success(id.clone(), "hi").payload(), b"hi\n".to_vec());
        assert_eq!(JobResult::success(id.clone(), "").payload(), b"\n".to_vec());

        let failure = JobResult::failure(id, FailureKind::Decode, "bad");
        assert_eq!(failure.payload().last(), Some(&b'\n'));
    }
}
