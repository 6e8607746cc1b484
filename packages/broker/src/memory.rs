//! In-process broker with Redis list semantics.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::{Broker, BrokerError, BrokerFuture};

/// Scripted outcome for an upcoming pop.
#[derive(Debug, Clone, Copy)]
enum PopFault {
    Fail,
    TimeOut,
}

#[derive(Default)]
struct Lists {
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    pop_faults: VecDeque<PopFault>,
    failing_pushes: u32,
}

/// Broker keeping its lists in memory.
///
/// `pop` takes from the head like `BLPOP` and `push` prepends like `LPUSH`.
/// Producers that want FIFO intake append with [`MemoryBroker::enqueue`],
/// the equivalent of `RPUSH`. Upcoming pops and pushes can be scripted to
/// fail or time out.
#[derive(Default)]
pub struct MemoryBroker {
    inner: Mutex<Lists>,
    pushed: Notify,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Lists> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append `payload` to the tail of `list`.
    pub fn enqueue(&self, list: &str, payload: impl Into<Vec<u8>>) {
        self.lock()
            .lists
            .entry(list.to_string())
            .or_default()
            .push_back(payload.into());
        self.pushed.notify_waiters();
    }

    /// Make the next `n` pops fail with a broker error.
    pub fn fail_next_pops(&self, n: usize) {
        self.lock()
            .pop_faults
            .extend(std::iter::repeat_n(PopFault::Fail, n));
    }

    /// Make the next `n` pops time out immediately.
    pub fn time_out_next_pops(&self, n: usize) {
        self.lock()
            .pop_faults
            .extend(std::iter::repeat_n(PopFault::TimeOut, n));
    }

    /// Make the next `n` pushes fail with a broker error.
    pub fn fail_next_pushes(&self, n: u32) {
        self.lock().failing_pushes += n;
    }

    /// Number of items in `list`.
    pub fn len(&self, list: &str) -> usize {
        self.lock().lists.get(list).map_or(0, VecDeque::len)
    }

    /// True when `list` holds no items.
    pub fn is_empty(&self, list: &str) -> bool {
        self.len(list) == 0
    }

    /// Remove and return every item of `list`, head first.
    pub fn drain(&self, list: &str) -> Vec<Vec<u8>> {
        self.lock()
            .lists
            .remove(list)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Names of the lists currently holding items.
    pub fn list_names(&self) -> Vec<String> {
        let lists = self.lock();
        let mut names: Vec<String> = lists
            .lists
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl Broker for MemoryBroker {
    fn pop<'a>(&'a self, list: &'a str, timeout: Duration) -> BrokerFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);

            loop {
                let pushed = self.pushed.notified();
                tokio::pin!(pushed);
                pushed.as_mut().enable();

                {
                    let mut lists = self.lock();
                    match lists.pop_faults.pop_front() {
                        Some(PopFault::Fail) => {
                            return Err(BrokerError::Injected("injected pop failure".into()));
                        }
                        Some(PopFault::TimeOut) => return Ok(None),
                        None => {}
                    }
                    if let Some(item) = lists.lists.get_mut(list).and_then(VecDeque::pop_front) {
                        return Ok(Some(item));
                    }
                }

                match deadline {
                    Some(deadline) => {
                        if tokio::time::timeout_at(deadline, pushed).await.is_err() {
                            return Ok(None);
                        }
                    }
                    None => pushed.await,
                }
            }
        })
    }

    fn push<'a>(&'a self, list: &'a str, payload: &'a [u8]) -> BrokerFuture<'a, ()> {
        Box::pin(async move {
            {
                let mut lists = self.lock();
                if lists.failing_pushes > 0 {
                    lists.failing_pushes -= 1;
                    return Err(BrokerError::Injected("injected push failure".into()));
                }
                lists
                    .lists
                    .entry(list.to_string())
                    .or_default()
                    .push_front(payload.to_vec());
            }
            self.pushed.notify_waiters();
            Ok(())
        })
    }
}
