//! Block queue shared by the worker pool.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::blocks::Block;

/// FIFO of pending block tasks. Idle workers block on it with a bounded
/// wait instead of sleeping and re-polling.
#[derive(Default)]
pub(crate) struct BlockQueue {
    pending: Mutex<VecDeque<Block>>,
    ready: Condvar,
}

impl BlockQueue {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Block>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn seed<I: IntoIterator<Item = Block>>(&self, blocks: I) {
        self.lock().extend(blocks);
        self.ready.notify_all();
    }

    pub(crate) fn push(&self, block: Block) {
        self.lock().push_back(block);
        self.ready.notify_one();
    }

    /// Next block, waiting up to `timeout` for one to arrive.
    pub(crate) fn pop_timeout(&self, timeout: Duration) -> Option<Block> {
        let mut pending = self.lock();
        if let Some(block) = pending.pop_front() {
            return Some(block);
        }
        let (mut pending, _) = self
            .ready
            .wait_timeout(pending, timeout)
            .unwrap_or_else(|e| e.into_inner());
        pending.pop_front()
    }

    /// Wake every waiting worker so it re-checks the termination predicate.
    pub(crate) fn wake_all(&self) {
        let _guard = self.lock();
        self.ready.notify_all();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }
}
