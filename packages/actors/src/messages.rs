//! Message types for actor communication.

use ractor::RpcReplyPort;
use xrender_core::WorkerStats;

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Run one cycle: drain check, pop, process, publish.
    Poll,

    /// Get the worker's counters.
    GetStats { reply: RpcReplyPort<WorkerStats> },
}
