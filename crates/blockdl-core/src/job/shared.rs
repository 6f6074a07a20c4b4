//! State shared between the job controller and its threads.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use super::queue::BlockQueue;
use crate::progress::{ProgressSample, ProgressSnapshot, Speeds};

/// Cross-thread counters. All are monotonically increasing within a run.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) blocks_total: AtomicUsize,
    pub(crate) blocks_succeeded: AtomicUsize,
    pub(crate) blocks_failed: AtomicUsize,
    pub(crate) blocks_written: AtomicUsize,
    pub(crate) bytes_downloaded: AtomicU64,
    pub(crate) bytes_written: AtomicU64,
    /// Range lengths of permanently failed blocks.
    pub(crate) bytes_failed: AtomicU64,
}

/// Everything the workers, writer and sampler observe. Owned by an `Arc`
/// held by the job, its threads and any `JobHandle`.
#[derive(Default)]
pub(crate) struct JobShared {
    pub(crate) counters: Counters,
    pub(crate) queue: BlockQueue,
    started: AtomicBool,
    running: AtomicBool,
    total_size: AtomicU64,
    bytes_present: AtomicU64,
    bytes_to_fetch: AtomicU64,
    speeds: Mutex<Speeds>,
    // Interruptible sleep for the sampler.
    wake_lock: Mutex<()>,
    wake: Condvar,
}

impl JobShared {
    /// Record the resume plan before any thread starts.
    pub(crate) fn set_plan(&self, total_size: u64, blocks_total: usize, bytes_to_fetch: u64) {
        self.total_size.store(total_size, Ordering::SeqCst);
        self.bytes_to_fetch.store(bytes_to_fetch, Ordering::SeqCst);
        self.bytes_present
            .store(total_size.saturating_sub(bytes_to_fetch), Ordering::SeqCst);
        self.counters
            .blocks_total
            .store(blocks_total, Ordering::SeqCst);
    }

    pub(crate) fn mark_running(&self) {
        self.started.store(true, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    /// Clear the running flag and wake every waiting loop.
    pub(crate) fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake_sleepers();
        self.queue.wake_all();
    }

    /// Wake the sampler so it re-checks whether to exit.
    pub(crate) fn wake_sleepers(&self) {
        let _guard = self.wake_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.wake.notify_all();
    }

    /// Sleep up to `d`, returning early on stop or completion.
    pub(crate) fn pause(&self, d: Duration) {
        let guard = self.wake_lock.lock().unwrap_or_else(|e| e.into_inner());
        if !self.is_running() || self.is_finished() {
            return;
        }
        let _ = self.wake.wait_timeout(guard, d);
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Every block has succeeded or permanently failed.
    pub(crate) fn block_complete(&self) -> bool {
        let c = &self.counters;
        let done = c.blocks_succeeded.load(Ordering::SeqCst) + c.blocks_failed.load(Ordering::SeqCst);
        done == c.blocks_total.load(Ordering::SeqCst)
    }

    /// The writer has persisted every block that will ever succeed.
    pub(crate) fn write_complete(&self) -> bool {
        let c = &self.counters;
        let expected = c
            .blocks_total
            .load(Ordering::SeqCst)
            .saturating_sub(c.blocks_failed.load(Ordering::SeqCst));
        c.blocks_written.load(Ordering::SeqCst) >= expected
    }

    /// The sole termination predicate for every loop.
    pub(crate) fn is_finished(&self) -> bool {
        self.is_started() && self.block_complete() && self.write_complete()
    }

    pub(crate) fn sample(&self) -> ProgressSample {
        ProgressSample {
            at: Instant::now(),
            bytes_written: self.counters.bytes_written.load(Ordering::Relaxed),
            bytes_downloaded: self.counters.bytes_downloaded.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn set_speeds(&self, speeds: Speeds) {
        *self.speeds.lock().unwrap_or_else(|e| e.into_inner()) = speeds;
    }

    pub(crate) fn total_size(&self) -> u64 {
        self.total_size.load(Ordering::SeqCst)
    }

    pub(crate) fn snapshot(&self) -> ProgressSnapshot {
        let c = &self.counters;
        let bytes_written = c.bytes_written.load(Ordering::Relaxed);
        ProgressSnapshot {
            total_bytes: self.total_size(),
            bytes_present: self.bytes_present.load(Ordering::SeqCst),
            bytes_downloaded: c.bytes_downloaded.load(Ordering::Relaxed),
            bytes_written,
            bytes_remaining: self
                .bytes_to_fetch
                .load(Ordering::SeqCst)
                .saturating_sub(bytes_written)
                .saturating_sub(c.bytes_failed.load(Ordering::SeqCst)),
            speeds: *self.speeds.lock().unwrap_or_else(|e| e.into_inner()),
            blocks_total: c.blocks_total.load(Ordering::SeqCst),
            blocks_succeeded: c.blocks_succeeded.load(Ordering::SeqCst),
            blocks_failed: c.blocks_failed.load(Ordering::SeqCst),
            blocks_written: c.blocks_written.load(Ordering::SeqCst),
        }
    }
}
