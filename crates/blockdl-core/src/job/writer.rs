//! Single writer: the only code that mutates the destination's content.

use anyhow::{Context, Result};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use super::shared::JobShared;
use crate::blocks::BlockLayout;
use crate::storage::StorageWriter;

/// A fetched block on its way to disk. Owned by the writer once sent.
#[derive(Debug)]
pub(crate) struct WritePayload {
    pub(crate) block_index: usize,
    pub(crate) data: Vec<u8>,
}

/// Drains the write queue in batches until the job stops, finishes, or every
/// producer has hung up. Any I/O error stops the whole job.
pub(super) fn run_writer(
    shared: &JobShared,
    storage: StorageWriter,
    layout: BlockLayout,
    rx: Receiver<WritePayload>,
    poll: Duration,
) -> Result<()> {
    let result = drain(shared, &storage, layout, &rx, poll).and_then(|()| storage.sync());
    if result.is_err() {
        shared.request_stop();
    }
    // The sampler may be sleeping; let it see the final state.
    shared.wake_sleepers();
    result
}

fn drain(
    shared: &JobShared,
    storage: &StorageWriter,
    layout: BlockLayout,
    rx: &Receiver<WritePayload>,
    poll: Duration,
) -> Result<()> {
    let counters = &shared.counters;
    let mut batch: Vec<WritePayload> = Vec::new();
    loop {
        if !shared.is_running() || shared.is_finished() {
            return Ok(());
        }
        match rx.recv_timeout(poll) {
            Ok(payload) => batch.push(payload),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
        batch.extend(rx.try_iter());
        // Ascending offsets keep seeks short; correctness does not depend on it.
        batch.sort_unstable_by_key(|p| p.block_index);

        for payload in batch.drain(..) {
            storage
                .write_at(layout.offset(payload.block_index), &payload.data)
                .with_context(|| format!("failed to write block {}", payload.block_index))?;
            counters
                .bytes_written
                .fetch_add(payload.data.len() as u64, Ordering::Relaxed);
            counters.blocks_written.fetch_add(1, Ordering::SeqCst);
        }
        tracing::trace!(written = counters.blocks_written.load(Ordering::Relaxed), "batch written");
    }
}
