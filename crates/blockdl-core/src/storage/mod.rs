//! Disk I/O for the destination file.
//!
//! Creates and zero-fills the destination in bounded chunks, and provides
//! positioned writes (pwrite) at block offsets. There is no temp file: the
//! destination itself is the only persisted state, and resume reads it back.

mod builder;
mod writer;

pub use builder::StorageWriterBuilder;
pub use writer::StorageWriter;

/// Default zero-fill chunk size (20 MiB).
pub const DEFAULT_PREFILL_CHUNK: usize = 20 * 1024 * 1024;
