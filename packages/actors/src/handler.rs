//! Operation trait and registry.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use xrender_core::{ExecutionContext, JobDescriptor};

/// Result type for operations: a JSON value or an error message.
pub type OperationResult = Result<Value, String>;

/// Future type for async operations.
pub type OperationFuture = BoxFuture<'static, OperationResult>;

/// Number of positional arguments an operation accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Arity {
    #[default]
    Any,
    Exact(usize),
    AtLeast(usize),
    /// Inclusive bounds.
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Any => true,
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(min, max) => (min..=max).contains(&count),
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Any => write!(f, "any number of"),
            Arity::Exact(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
            Arity::Range(min, max) => write!(f, "{} to {}", min, max),
        }
    }
}

/// One call of an operation: the replayed context and the arguments.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub context: ExecutionContext,
    pub arguments: Vec<Value>,
}

impl Invocation {
    pub fn new(context: ExecutionContext, arguments: Vec<Value>) -> Self {
        Self { context, arguments }
    }

    /// Install the job's environment and take its arguments.
    pub fn for_job(job: JobDescriptor) -> Self {
        let context = ExecutionContext::for_job(&job);
        Self::new(context, job.arguments)
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.arguments.get(index)
    }

    /// Positional argument as a string.
    pub fn str_arg(&self, index: usize) -> Result<&str, String> {
        match self.arg(index) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(format!("argument {} must be a string, got {}", index, other)),
            None => Err(format!("missing argument {}", index)),
        }
    }

    /// Positional argument as an unsigned integer; numeric strings are accepted.
    pub fn u64_arg(&self, index: usize) -> Result<u64, String> {
        match self.arg(index) {
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| format!("argument {} must be a non-negative integer", index)),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| format!("argument {} must be a non-negative integer", index)),
            Some(other) => Err(format!("argument {} must be an integer, got {}", index, other)),
            None => Err(format!("missing argument {}", index)),
        }
    }
}

/// Trait for invokable operations.
///
/// Implement this trait to make an operation callable by name from jobs.
pub trait Operation: Send + Sync + 'static {
    /// The name jobs use to call this operation.
    fn name(&self) -> &str;

    /// Accepted argument count, checked before invocation.
    fn arity(&self) -> Arity {
        Arity::Any
    }

    /// Run the operation.
    fn invoke(&self, invocation: Invocation) -> OperationFuture;
}

/// Errors raised while registering operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("operation name must not be empty")]
    EmptyName,
    #[error("operation name {0:?} contains whitespace")]
    InvalidName(String),
    #[error("operation {0:?} is already registered")]
    Duplicate(String),
    #[error("operation {0:?} declares an empty argument range")]
    InvalidArity(String),
}

/// Registry mapping operation names to their implementations.
#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }

    /// Register an operation under its name.
    pub fn register<O: Operation>(&mut self, operation: O) -> Result<(), RegistryError> {
        let name = operation.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(RegistryError::InvalidName(name));
        }
        if matches!(operation.arity(), Arity::Range(min, max) if min > max) {
            return Err(RegistryError::InvalidArity(name));
        }
        if self.operations.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        tracing::debug!("Registered operation: {}", name);
        self.operations.insert(name, Arc::new(operation));
        Ok(())
    }

    /// Get an operation by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.operations.get(name).cloned()
    }

    /// Check if an operation is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// List all registered operation names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// A simple function-based operation.
pub struct FnOperation<F>
where
    F: Fn(Invocation) -> OperationFuture + Send + Sync + 'static,
{
    name: String,
    arity: Arity,
    handler: F,
}

impl<F> FnOperation<F>
where
    F: Fn(Invocation) -> OperationFuture + Send + Sync + 'static,
{
    /// Create a new function-based operation.
    pub fn new(name: impl Into<String>, arity: Arity, handler: F) -> Self {
        Self {
            name: name.into(),
            arity,
            handler,
        }
    }
}

impl<F> Operation for FnOperation<F>
where
    F: Fn(Invocation) -> OperationFuture + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> Arity {
        self.arity
    }

    fn invoke(&self, invocation: Invocation) -> OperationFuture {
        (self.handler)(invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use xrender_core::JobId;

    fn noop(name: &'static str, arity: Arity) -> impl Operation {
        FnOperation::new(name, arity, |_| Box::pin(async { Ok(Value::Null) }))
    }

    #[test]
    fn arity_bounds() {
        assert!(Arity::Any.accepts(0));
        assert!(Arity::Exact(1).accepts(1));
        assert!(!Arity::Exact(1).accepts(2));
        assert!(Arity::AtLeast(1).accepts(3));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert!(Arity::Range(1, 2).accepts(2));
        assert!(!Arity::Range(1, 2).accepts(3));
    }

    #[test]
    fn registration_is_validated() {
        let mut registry = OperationRegistry::new();
        assert_eq!(registry.register(noop("echo", Arity::Exact(1))), Ok(()));
        assert_eq!(
            registry.register(noop("echo", Arity::Any)),
            Err(RegistryError::Duplicate("echo".into()))
        );
        assert_eq!(registry.register(noop("", Arity::Any)), Err(RegistryError::EmptyName));
        assert_eq!(
            registry.register(noop("two words", Arity::Any)),
            Err(RegistryError::InvalidName("two words".into()))
        );
        assert_eq!(
            registry.register(noop("bad", Arity::Range(3, 1))),
            Err(RegistryError::InvalidArity("bad".into()))
        );
        assert_eq!(registry.names(), vec!["echo"]);
        assert!(registry.contains("echo"));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn typed_argument_accessors() {
        let job = JobDescriptor::new(JobId::parse("1").expect("id"), "op")
            .with_arguments(vec![json!("text"), json!(3), json!("12"), json!(-1)]);
        let invocation = Invocation::for_job(job);

        assert_eq!(invocation.str_arg(0), Ok("text"));
        assert!(invocation.str_arg(1).is_err());
        assert_eq!(invocation.u64_arg(1), Ok(3));
        assert_eq!(invocation.u64_arg(2), Ok(12));
        assert!(invocation.u64_arg(3).is_err());
        assert_eq!(invocation.u64_arg(9), Err("missing argument 9".to_string()));
        assert_eq!(invocation.context.job_id().as_str(), "1");
    }
}
