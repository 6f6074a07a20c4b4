//! Resume scan: infer prior progress from the destination file's content.
//!
//! A destination that exists with exactly the remote size is scanned block by
//! block; a block whose bytes are all zero is considered missing, anything
//! else is considered already downloaded. Any other destination is recreated
//! and zero-filled first, which makes every block missing.
//!
//! This is a content heuristic, not a manifest: a source block that is
//! legitimately all zero is indistinguishable from one never written and is
//! fetched again on every run.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::blocks::BlockLayout;
use crate::storage::{StorageWriter, StorageWriterBuilder};

/// Scratch buffer size used while comparing blocks against zero.
const SCAN_BUF: usize = 64 * 1024;

/// Which blocks still need fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePlan {
    /// Indices of missing blocks, ascending.
    pub missing: Vec<usize>,
    /// Number of blocks found already written.
    pub present: usize,
    /// True if the destination is absent or has the wrong size and must be
    /// recreated before downloading.
    pub needs_prefill: bool,
}

impl ResumePlan {
    fn all_missing(layout: &BlockLayout) -> Self {
        ResumePlan {
            missing: (0..layout.block_count()).collect(),
            present: 0,
            needs_prefill: true,
        }
    }
}

/// Read-only planning: reports what a download would fetch without touching
/// the destination.
pub fn plan(path: &Path, layout: &BlockLayout) -> Result<ResumePlan> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() == layout.total_size() => {
            let missing = scan_missing(path, layout)?;
            Ok(ResumePlan {
                present: layout.block_count() - missing.len(),
                missing,
                needs_prefill: false,
            })
        }
        Ok(meta) if meta.is_dir() => {
            anyhow::bail!("destination {} is a directory", path.display())
        }
        Ok(_) => Ok(ResumePlan::all_missing(layout)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ResumePlan::all_missing(layout)),
        Err(e) => Err(e).with_context(|| format!("failed to stat {}", path.display())),
    }
}

/// Make sure the destination exists with exactly the layout's total size,
/// zero-filling it in `prefill_chunk`-byte writes when it has to be
/// (re)created, then scan it. Returns the plan and a writer for the blocks.
pub fn prepare(
    path: &Path,
    layout: &BlockLayout,
    prefill_chunk: usize,
) -> Result<(ResumePlan, StorageWriter)> {
    let plan = plan(path, layout)?;
    if !plan.needs_prefill {
        tracing::info!(
            path = %path.display(),
            present = plan.present,
            missing = plan.missing.len(),
            "resuming existing destination"
        );
        let writer = StorageWriter::open_existing(path)?;
        return Ok((plan, writer));
    }

    tracing::info!(
        path = %path.display(),
        size = layout.total_size(),
        "creating zero-filled destination"
    );
    let mut builder = StorageWriterBuilder::create(path)?;
    builder.prefill_zeros(layout.total_size(), prefill_chunk)?;
    Ok((plan, builder.build()))
}

/// Scan `path` sequentially in block-sized chunks and return the indices of
/// blocks that are entirely zero. The final block is compared over its own
/// (possibly shorter) length.
pub fn scan_missing(path: &Path, layout: &BlockLayout) -> Result<Vec<usize>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = BufReader::with_capacity(SCAN_BUF, file);
    let mut scratch = vec![0u8; SCAN_BUF];
    let mut missing = Vec::new();

    for index in 0..layout.block_count() {
        let len = layout.len(index);
        if is_zero_block(&mut reader, len, &mut scratch)
            .with_context(|| format!("failed to scan block {}", index))?
        {
            missing.push(index);
        }
    }
    Ok(missing)
}

/// Consume `len` bytes from `reader`, returning true if every one was zero.
fn is_zero_block<R: Read>(reader: &mut R, len: u64, scratch: &mut [u8]) -> std::io::Result<bool> {
    let mut remaining = len;
    let mut all_zero = true;
    while remaining > 0 {
        let n = remaining.min(scratch.len() as u64) as usize;
        reader.read_exact(&mut scratch[..n])?;
        if all_zero && scratch[..n].iter().any(|&b| b != 0) {
            all_zero = false;
        }
        remaining -= n as u64;
    }
    Ok(all_zero)
}
