//! Builder for creating and zero-filling destination files.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::writer::StorageWriter;

/// Builder for a fresh destination file. Call `prefill_zeros` then `build`
/// to get a `StorageWriter` for positioned block writes.
pub struct StorageWriterBuilder {
    file: File,
    path: PathBuf,
}

impl StorageWriterBuilder {
    /// Create the destination at `path`, truncating anything already there.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("failed to create destination: {}", path.display()))?;
        Ok(StorageWriterBuilder {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Write `size` zero bytes from the start of the file, `chunk` bytes at a
    /// time so peak memory stays at one chunk regardless of file size.
    pub fn prefill_zeros(&mut self, size: u64, chunk: usize) -> Result<()> {
        let chunk = chunk.max(1);
        let zeros = vec![0u8; chunk.min(size as usize).max(1)];
        let mut out = &self.file;
        let mut remaining = size;
        while remaining > 0 {
            let n = remaining.min(zeros.len() as u64) as usize;
            out.write_all(&zeros[..n])
                .with_context(|| format!("failed to pre-fill {}", self.path.display()))?;
            remaining -= n as u64;
        }
        out.flush().context("failed to flush pre-fill")?;
        tracing::debug!(path = %self.path.display(), size, chunk, "destination pre-filled");
        Ok(())
    }

    /// Finish building and return the positioned writer.
    pub fn build(self) -> StorageWriter {
        StorageWriter::from_file_and_path(self.file, self.path)
    }
}
