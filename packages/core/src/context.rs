//! Per-call execution context replayed from a job's environment.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::job::{Environment, JobDescriptor, JobId};

/// Request-scoped state an operation runs under.
///
/// Built fresh for every dispatch and handed to the operation by value, so
/// nothing from one job is visible to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionContext {
    job_id: JobId,
    acting_user: Value,
    request_path: String,
    session_data: BTreeMap<String, Value>,
}

impl ExecutionContext {
    /// Replay an environment for the given job.
    pub fn new(job_id: JobId, environment: Environment) -> Self {
        Self {
            job_id,
            acting_user: environment.acting_user,
            request_path: environment.request_path,
            session_data: environment.session_data,
        }
    }

    /// Replay the environment carried by a job descriptor.
    pub fn for_job(job: &JobDescriptor) -> Self {
        Self::new(job.id.clone(), job.environment.clone())
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn acting_user(&self) -> &Value {
        &self.acting_user
    }

    /// True when the job was submitted without a user.
    pub fn is_anonymous(&self) -> bool {
        self.acting_user.is_null()
    }

    pub fn request_path(&self) -> &str {
        &self.request_path
    }

    pub fn session(&self, key: &str) -> Option<&Value> {
        self.session_data.get(key)
    }

    pub fn session_data(&self) -> &BTreeMap<String, Value> {
        &self.session_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replays_environment() {
        let env = Environment::new(json!({ "uid": 5 }), "node/5/edit")
            .with_session("cart", json!([1, 2]));
        let job = JobDescriptor::new(JobId::parse("j1").expect("id"), "render")
            .with_environment(env);

        let ctx = ExecutionContext::for_job(&job);
        assert_eq!(ctx.job_id().as_str(), "j1");
        assert_eq!(ctx.acting_user()["uid"], 5);
        assert!(!ctx.is_anonymous());
        assert_eq!(ctx.request_path(), "node/5/edit");
        assert_eq!(ctx.session("cart"), Some(&json!([1, 2])));
        assert_eq!(ctx.session("missing"), None);
    }
}
