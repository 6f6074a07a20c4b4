//! Worker pool loop: fetch blocks, hand payloads to the writer.

use std::sync::atomic::Ordering;
use std::sync::mpsc::Sender;
use std::time::Duration;

use super::shared::JobShared;
use super::writer::WritePayload;
use crate::blocks::BlockLayout;
use crate::fetcher::RangeFetcher;

/// Per-worker configuration.
pub(super) struct WorkerContext {
    pub(super) id: usize,
    pub(super) layout: BlockLayout,
    pub(super) fetcher: RangeFetcher,
    /// Requeues allowed per block after its first failed fetch.
    pub(super) block_retries: u32,
    pub(super) poll: Duration,
}

/// Runs until the job stops, or the queue is empty and every block has
/// reached a terminal state. Never touches the destination file.
pub(super) fn run_worker(ctx: WorkerContext, shared: &JobShared, writes: Sender<WritePayload>) {
    let counters = &shared.counters;
    loop {
        if !shared.is_running() {
            break;
        }
        let block = match shared.queue.pop_timeout(ctx.poll) {
            Some(block) => block,
            None if shared.block_complete() => break,
            None => continue,
        };

        let (start, end) = ctx.layout.range(block.index);
        match ctx.fetcher.fetch(start, end) {
            Ok(data) => {
                counters
                    .bytes_downloaded
                    .fetch_add(ctx.layout.len(block.index), Ordering::Relaxed);
                let payload = WritePayload {
                    block_index: block.index,
                    data,
                };
                if writes.send(payload).is_err() {
                    tracing::warn!(worker = ctx.id, block = block.index, "writer gone, dropping block");
                    break;
                }
                counters.blocks_succeeded.fetch_add(1, Ordering::SeqCst);
                tracing::trace!(worker = ctx.id, block = block.index, "block fetched");
            }
            Err(e) if block.retry_count < ctx.block_retries => {
                tracing::warn!(
                    worker = ctx.id,
                    block = block.index,
                    retry = block.retry_count + 1,
                    "block fetch failed, requeueing: {}",
                    e
                );
                shared.queue.push(block.retried());
            }
            Err(e) => {
                counters
                    .bytes_failed
                    .fetch_add(ctx.layout.len(block.index), Ordering::SeqCst);
                counters.blocks_failed.fetch_add(1, Ordering::SeqCst);
                tracing::error!(
                    worker = ctx.id,
                    block = block.index,
                    attempts = block.retry_count + 1,
                    "block permanently failed: {}",
                    e
                );
            }
        }

        if shared.block_complete() {
            shared.queue.wake_all();
        }
    }
    tracing::debug!(worker = ctx.id, "worker exiting");
}
