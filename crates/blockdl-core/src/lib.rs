//! Resumable, parallel, block-based HTTP downloads.
//!
//! The engine splits a remote object into fixed-size blocks, fetches them
//! with concurrent HTTP range requests and writes each block at its offset in
//! a pre-allocated local file. A block that is still all zeros on disk is
//! treated as missing, so an interrupted download resumes by scanning the
//! destination file.

pub mod blocks;
pub mod config;
pub mod fetch_head;
pub mod fetcher;
pub mod job;
pub mod logging;
pub mod naming;
pub mod progress;
pub mod resume;
pub mod retry;
pub mod storage;
pub mod transport;

pub use blocks::{Block, BlockLayout};
pub use config::BlockdlConfig;
pub use job::{DownloadJob, Job, JobHandle, JobReport, JobRequest, JobSettings, JobState};
pub use progress::ProgressSnapshot;
pub use resume::ResumePlan;
pub use transport::{CurlTransport, Transport};
