//! Operations every worker serves.

use std::time::Duration;

use actors::{Arity, FnOperation, Invocation, OperationRegistry, OperationResult, RegistryError};
use serde_json::{Value, json};

/// Register the built-in operations.
pub fn register_builtin(registry: &mut OperationRegistry) -> Result<(), RegistryError> {
    registry.register(FnOperation::new("echo", Arity::Exact(1), |inv| {
        Box::pin(echo(inv))
    }))?;
    registry.register(FnOperation::new("whoami", Arity::Exact(0), |inv| {
        Box::pin(whoami(inv))
    }))?;
    registry.register(FnOperation::new("sleep", Arity::Exact(1), |inv| {
        Box::pin(sleep(inv))
    }))?;
    registry.register(FnOperation::new("fail", Arity::Range(0, 1), |inv| {
        Box::pin(fail(inv))
    }))?;
    Ok(())
}

async fn echo(inv: Invocation) -> OperationResult {
    Ok(inv.arguments.into_iter().next().unwrap_or(Value::Null))
}

/// Reports the identity the job runs as.
async fn whoami(inv: Invocation) -> OperationResult {
    let ctx = inv.context;
    Ok(json!({
        "user": ctx.acting_user(),
        "anonymous": ctx.is_anonymous(),
        "path": ctx.request_path(),
    }))
}

async fn sleep(inv: Invocation) -> OperationResult {
    let seconds = inv.u64_arg(0)?;
    tracing::info!("Sleeping for {} seconds", seconds);
    tokio::time::sleep(Duration::from_secs(seconds)).await;
    Ok(Value::String(format!("Slept for {} seconds", seconds)))
}

async fn fail(inv: Invocation) -> OperationResult {
    let message = inv.str_arg(0).unwrap_or("Intentional failure");
    Err(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actors::{Dispatcher, OperationError};
    use std::sync::Arc;
    use xrender_core::{Environment, JobDescriptor, JobId};

    fn dispatcher() -> Dispatcher {
        let mut registry = OperationRegistry::new();
        register_builtin(&mut registry).expect("builtin operations");
        Dispatcher::new(Arc::new(registry))
    }

    fn job(operation: &str, arguments: Vec<Value>) -> JobDescriptor {
        JobDescriptor::new(JobId::parse("t").expect("id"), operation).with_arguments(arguments)
    }

    #[test]
    fn builtins_cannot_be_registered_twice() {
        let mut registry = OperationRegistry::new();
        register_builtin(&mut registry).expect("first");
        assert_eq!(registry.names(), vec!["echo", "fail", "sleep", "whoami"]);
        assert!(register_builtin(&mut registry).is_err());
    }

    #[tokio::test]
    async fn echo_returns_the_argument() {
        let output = dispatcher().dispatch(job("echo", vec![json!("hi")])).await;
        assert_eq!(output, Ok("hi".to_string()));
    }

    #[tokio::test]
    async fn whoami_reports_the_replayed_user() {
        let env = Environment::new(json!({ "uid": 4, "name": "admin" }), "admin/config");
        let output = dispatcher()
            .dispatch(job("whoami", vec![]).with_environment(env))
            .await
            .expect("whoami");
        let value: Value = serde_json::from_str(&output).expect("json");
        assert_eq!(value["user"]["name"], "admin");
        assert_eq!(value["anonymous"], false);
        assert_eq!(value["path"], "admin/config");
    }

    #[tokio::test]
    async fn sleep_validates_its_argument() {
        let output = dispatcher().dispatch(job("sleep", vec![json!(0)])).await;
        assert_eq!(output, Ok("Slept for 0 seconds".to_string()));

        let err = dispatcher().dispatch(job("sleep", vec![json!("soon")])).await;
        assert!(matches!(err, Err(OperationError::Failed { .. })));
    }

    #[tokio::test]
    async fn fail_uses_the_given_message() {
        let err = dispatcher().dispatch(job("fail", vec![json!("nope")])).await;
        assert_eq!(
            err,
            Err(OperationError::Failed {
                operation: "fail".into(),
                cause: "nope".into()
            })
        );
    }
}
