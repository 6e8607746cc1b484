//! Core domain types for the xRender job worker.
//!
//! This crate contains shared types used across all packages:
//! - JobDescriptor and JobResult for work items and their responses
//! - The wire codec and the broker list names
//! - ExecutionContext, the per-call replay of a job's environment
//! - Worker configuration, state and events

pub mod channels;
pub mod codec;
mod config;
mod context;
mod events;
mod job;
mod worker;

pub use codec::DecodeError;
pub use config::WorkerConfig;
pub use context::ExecutionContext;
pub use events::WorkerEvent;
pub use job::{Environment, FailureKind, InvalidJobId, JobDescriptor, JobId, JobResult, Outcome};
pub use worker::{WorkerId, WorkerState, WorkerStats};
