//! Broker client for the xRender job worker.
//!
//! The worker only needs two primitives against named lists: a blocking,
//! destructive pop from the head and a push. This crate defines them as
//! the [`Broker`] trait and provides a Redis implementation.
//!
//! # Features
//!
//! - `memory` (default): in-process [`MemoryBroker`] for tests and local runs

mod connection;
#[cfg(feature = "memory")]
mod memory;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use connection::{BrokerConfig, BrokerError, RedisBroker};
#[cfg(feature = "memory")]
pub use memory::MemoryBroker;

/// Future type returned by broker operations.
pub type BrokerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BrokerError>> + Send + 'a>>;

/// List primitives the worker loop runs on.
pub trait Broker: Send + Sync + 'static {
    /// Pop the head of `list`, waiting up to `timeout` for an item.
    ///
    /// A zero timeout waits indefinitely. Returns `None` when the window
    /// elapsed without an item.
    fn pop<'a>(&'a self, list: &'a str, timeout: Duration) -> BrokerFuture<'a, Option<Vec<u8>>>;

    /// Push `payload` onto the head of `list`.
    fn push<'a>(&'a self, list: &'a str, payload: &'a [u8]) -> BrokerFuture<'a, ()>;
}
