//! Actor system for the xRender job worker.
//!
//! This crate provides the operation registry, the dispatcher that runs a
//! job's operation under its replayed environment, and the Ractor-based
//! worker loop.
//!
//! # Architecture
//!
//! - `OperationRegistry` - Named operations with validated argument counts
//! - `Dispatcher` - Resolves, replays the environment and invokes
//! - `WorkerActor` - Pops jobs, dispatches them and publishes the results
//!
//! # Usage
//!
//! ```ignore
//! use actors::{Dispatcher, OperationRegistry, WorkerArgs, await_drained, start_worker};
//!
//! let dispatcher = Dispatcher::new(Arc::new(registry));
//! let (status_tx, status) = watch::channel(WorkerStats::new(worker_id));
//! let (worker, handle) = start_worker(WorkerArgs { status_tx: Some(status_tx), ... }).await?;
//!
//! // Resolves once the job limit has been served; errors if the worker died
//! let stats = await_drained(handle, status).await?;
//! ```

mod dispatcher;
mod handler;
mod messages;
mod worker_actor;

pub use dispatcher::{Dispatcher, OperationError};
pub use handler::{
    Arity, FnOperation, Invocation, Operation, OperationFuture, OperationRegistry,
    OperationResult, RegistryError,
};
pub use messages::WorkerMessage;
pub use worker_actor::{
    WorkerActor, WorkerActorState, WorkerArgs, WorkerExitError, await_drained, start_worker,
};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
