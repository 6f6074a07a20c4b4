//! Job controller.
//!
//! A [`Job`] probes the remote object, runs the resume scan synchronously,
//! then launches N download workers, one writer and one progress sampler on
//! OS threads. Workers and writer are connected by two queues: a
//! condvar-backed block queue and an `mpsc` write queue. Counters live in an
//! `Arc`-shared struct of atomics which [`JobHandle`] exposes read-only.
//!
//! Termination is decided by one predicate, `finished`: every block succeeded
//! or permanently failed, and every successful block has been written.
//! Permanently failed blocks do not abort the job; check
//! [`JobReport::blocks_failed`].

mod queue;
mod sampler;
mod shared;
mod worker;
mod writer;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::blocks::{Block, BlockLayout};
use crate::fetcher::RangeFetcher;
use crate::progress::ProgressSnapshot;
use crate::resume::{self, ResumePlan};
use crate::retry::{run_with_retry, ErrorKind, RetryPolicy};
use crate::storage::{StorageWriter, DEFAULT_PREFILL_CHUNK};
use crate::transport::Transport;

use shared::JobShared;
use worker::WorkerContext;

/// Caller-supplied job parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub url: String,
    pub destination: PathBuf,
    pub block_size: u64,
    pub workers: usize,
}

/// The job as known after the metadata probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    pub destination: PathBuf,
    pub block_size: u64,
    pub worker_count: usize,
    /// Remote size; 0 until probed.
    pub total_size: u64,
    pub accepts_ranges: bool,
    /// Raw `Content-Disposition` from the probe, if the server sent one.
    pub content_disposition: Option<String>,
}

impl DownloadJob {
    /// Fixed-size block layout for this job. Range support as advertised by
    /// the probe does not change it; a server that really ignores `Range`
    /// fails each multi-block fetch with `FetchError::RangeIgnored`.
    pub fn layout(&self) -> BlockLayout {
        BlockLayout::new(self.block_size, self.total_size)
    }
}

/// Engine tuning: attempt budgets, buffer sizes and loop intervals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobSettings {
    /// Budget for issuing one range request.
    pub request_policy: RetryPolicy,
    /// Budget for reading one response body.
    pub read_policy: RetryPolicy,
    /// Budget for the metadata probe.
    pub probe_policy: RetryPolicy,
    /// Requeues per block after its first failed fetch.
    pub block_retries: u32,
    /// Zero-fill write size when creating the destination.
    pub prefill_chunk: usize,
    pub sample_interval: Duration,
    pub sample_window: usize,
    /// Upper bound on how long an idle worker or writer waits before
    /// re-checking the stop flag.
    pub poll_interval: Duration,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            request_policy: RetryPolicy::new(5, Duration::from_secs(3)),
            read_policy: RetryPolicy::new(10, Duration::from_secs(2)),
            probe_policy: RetryPolicy::new(5, Duration::from_secs(1)),
            block_retries: 2,
            prefill_chunk: DEFAULT_PREFILL_CHUNK,
            sample_interval: Duration::from_secs(1),
            sample_window: 5,
            poll_interval: Duration::from_millis(200),
        }
    }
}

/// Observable lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    NotStarted,
    Running,
    /// Started, no longer running, not finished (stopped or failed).
    Stopped,
    Finished,
}

/// Outcome of a joined job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub state: JobState,
    pub total_size: u64,
    pub blocks_present: usize,
    pub blocks_total: usize,
    pub blocks_succeeded: usize,
    pub blocks_failed: usize,
    pub blocks_written: usize,
    pub bytes_downloaded: u64,
    pub bytes_written: u64,
    pub elapsed: Duration,
}

impl JobReport {
    /// Finished with every block on disk.
    pub fn is_complete(&self) -> bool {
        self.state == JobState::Finished && self.blocks_failed == 0
    }
}

/// Cloneable read-only view of a job, plus a cooperative stop request.
#[derive(Clone)]
pub struct JobHandle {
    shared: Arc<JobShared>,
}

impl JobHandle {
    /// Ask every loop to exit at its next poll. Does not wait.
    pub fn request_stop(&self) {
        self.shared.request_stop();
    }

    pub fn state(&self) -> JobState {
        state_of(&self.shared)
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn is_finished(&self) -> bool {
        self.shared.is_finished()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.shared.total_size()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.shared.snapshot()
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.snapshot().bytes_downloaded
    }

    pub fn bytes_written(&self) -> u64 {
        self.snapshot().bytes_written
    }

    pub fn bytes_remaining(&self) -> u64 {
        self.snapshot().bytes_remaining
    }

    pub fn blocks_failed(&self) -> usize {
        self.snapshot().blocks_failed
    }

    pub fn download_speed_bytes_per_sec(&self) -> f64 {
        self.snapshot().speeds.download_bytes_per_sec
    }

    pub fn write_speed_bytes_per_sec(&self) -> f64 {
        self.snapshot().speeds.write_bytes_per_sec
    }

    pub fn estimated_seconds_remaining(&self) -> Option<f64> {
        self.snapshot().eta_secs()
    }
}

fn state_of(shared: &JobShared) -> JobState {
    if !shared.is_started() {
        JobState::NotStarted
    } else if shared.is_finished() {
        JobState::Finished
    } else if shared.is_running() {
        JobState::Running
    } else {
        JobState::Stopped
    }
}

struct Threads {
    workers: Vec<JoinHandle<()>>,
    writer: JoinHandle<Result<()>>,
    sampler: JoinHandle<()>,
}

/// A single resumable block download.
pub struct Job {
    job: DownloadJob,
    settings: JobSettings,
    transport: Arc<dyn Transport>,
    shared: Arc<JobShared>,
    probed: bool,
    blocks_present: usize,
    threads: Option<Threads>,
    started_at: Option<Instant>,
}

impl Job {
    pub fn new(
        request: JobRequest,
        transport: Arc<dyn Transport>,
        settings: JobSettings,
    ) -> Result<Self> {
        if request.block_size == 0 {
            anyhow::bail!("block size must be greater than zero");
        }
        if request.workers == 0 {
            anyhow::bail!("worker count must be greater than zero");
        }
        Ok(Job {
            job: DownloadJob {
                url: request.url,
                destination: request.destination,
                block_size: request.block_size,
                worker_count: request.workers,
                total_size: 0,
                accepts_ranges: false,
                content_disposition: None,
            },
            settings,
            transport,
            shared: Arc::new(JobShared::default()),
            probed: false,
            blocks_present: 0,
            threads: None,
            started_at: None,
        })
    }

    pub fn download_job(&self) -> &DownloadJob {
        &self.job
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Resolve the remote size and range support (once per job). Fails if
    /// the size cannot be determined within the probe budget.
    pub fn probe(&mut self) -> Result<&DownloadJob> {
        if self.probed {
            return Ok(&self.job);
        }
        let url = self.job.url.clone();
        let transport = Arc::clone(&self.transport);
        let head = run_with_retry(
            &self.settings.probe_policy,
            |_: &anyhow::Error| ErrorKind::Connection,
            |attempt| {
                transport
                    .probe(&url)
                    .inspect_err(|e| tracing::warn!(attempt, "metadata probe failed: {:#}", e))
            },
        )
        .with_context(|| format!("could not probe {}", url))?;

        let total_size = head
            .content_length
            .ok_or_else(|| anyhow::anyhow!("server did not report a size for {}", url))?;
        if !head.accept_ranges {
            tracing::warn!(%url, "server does not advertise byte ranges; requesting blocks anyway");
        }
        self.job.total_size = total_size;
        self.job.accepts_ranges = head.accept_ranges;
        self.job.content_disposition = head.content_disposition;
        self.probed = true;
        tracing::info!(
            %url,
            total_size,
            accepts_ranges = head.accept_ranges,
            blocks = self.job.layout().block_count(),
            "probed remote object"
        );
        Ok(&self.job)
    }

    /// Change where the object is written. Only allowed before `start`.
    pub fn set_destination(&mut self, destination: PathBuf) -> Result<()> {
        if self.shared.is_started() {
            anyhow::bail!("cannot move the destination of a started job");
        }
        self.job.destination = destination;
        Ok(())
    }

    /// Probe and scan without modifying the destination.
    pub fn plan(&mut self) -> Result<ResumePlan> {
        self.probe()?;
        resume::plan(&self.job.destination, &self.job.layout())
    }

    /// Run the resume scan, then launch workers, writer and sampler.
    pub fn start(&mut self) -> Result<()> {
        if self.shared.is_started() {
            anyhow::bail!("job already started");
        }
        self.probe()?;
        let layout = self.job.layout();
        let (plan, storage) =
            resume::prepare(&self.job.destination, &layout, self.settings.prefill_chunk)?;

        let bytes_to_fetch: u64 = plan.missing.iter().map(|&i| layout.len(i)).sum();
        self.blocks_present = plan.present;
        self.shared
            .set_plan(layout.total_size(), plan.missing.len(), bytes_to_fetch);
        self.shared
            .queue
            .seed(plan.missing.iter().copied().map(Block::new));
        self.shared.mark_running();
        self.started_at = Some(Instant::now());
        tracing::info!(
            missing = plan.missing.len(),
            present = plan.present,
            workers = self.job.worker_count,
            "starting download"
        );

        match self.spawn_threads(layout, storage) {
            Ok(threads) => {
                self.threads = Some(threads);
                Ok(())
            }
            Err(e) => {
                self.shared.request_stop();
                Err(e)
            }
        }
    }

    fn spawn_threads(&self, layout: BlockLayout, storage: StorageWriter) -> Result<Threads> {
        let settings = self.settings;
        let (tx, rx) = mpsc::channel();

        let shared = Arc::clone(&self.shared);
        let writer = thread::Builder::new()
            .name("blockdl-writer".to_string())
            .spawn(move || writer::run_writer(&shared, storage, layout, rx, settings.poll_interval))
            .context("failed to spawn writer thread")?;

        let fetcher = RangeFetcher::new(
            Arc::clone(&self.transport),
            self.job.url.clone(),
            settings.request_policy,
            settings.read_policy,
        );
        let mut workers = Vec::with_capacity(self.job.worker_count);
        for id in 0..self.job.worker_count {
            let ctx = WorkerContext {
                id,
                layout,
                fetcher: fetcher.clone(),
                block_retries: settings.block_retries,
                poll: settings.poll_interval,
            };
            let shared = Arc::clone(&self.shared);
            let tx = tx.clone();
            let handle = thread::Builder::new()
                .name(format!("blockdl-worker-{}", id))
                .spawn(move || worker::run_worker(ctx, &shared, tx))
                .context("failed to spawn worker thread")?;
            workers.push(handle);
        }
        // Workers hold the only senders; the writer sees a disconnect once they exit.
        drop(tx);

        let shared = Arc::clone(&self.shared);
        let sampler = thread::Builder::new()
            .name("blockdl-sampler".to_string())
            .spawn(move || {
                sampler::run_sampler(&shared, settings.sample_interval, settings.sample_window)
            })
            .context("failed to spawn sampler thread")?;

        Ok(Threads {
            workers,
            writer,
            sampler,
        })
    }

    /// Block until every thread has exited and report the outcome. Returns
    /// the writer's error if local storage failed.
    pub fn wait(&mut self) -> Result<JobReport> {
        let Some(threads) = self.threads.take() else {
            anyhow::bail!("job is not running");
        };

        let mut panicked = false;
        for handle in threads.workers {
            panicked |= handle.join().is_err();
        }
        let written = threads
            .writer
            .join()
            .map_err(|_| anyhow::anyhow!("writer thread panicked"));
        panicked |= threads.sampler.join().is_err();

        let finished = self.shared.is_finished();
        self.shared.request_stop();
        written??;
        if panicked {
            anyhow::bail!("a download thread panicked");
        }

        let report = self.report();
        if finished {
            tracing::info!(
                blocks_failed = report.blocks_failed,
                bytes_written = report.bytes_written,
                elapsed_secs = report.elapsed.as_secs_f64(),
                "download finished"
            );
        } else {
            tracing::info!(
                blocks_written = report.blocks_written,
                blocks_total = report.blocks_total,
                "download stopped before finishing"
            );
        }
        Ok(report)
    }

    /// Stop cooperatively and wait for every thread to exit. In-flight
    /// requests and writes run to completion first.
    pub fn stop(&mut self) -> Result<JobReport> {
        self.shared.request_stop();
        self.wait()
    }

    /// Start and wait.
    pub fn run(&mut self) -> Result<JobReport> {
        self.start()?;
        self.wait()
    }

    fn report(&self) -> JobReport {
        let snap = self.shared.snapshot();
        JobReport {
            state: state_of(&self.shared),
            total_size: snap.total_bytes,
            blocks_present: self.blocks_present,
            blocks_total: snap.blocks_total,
            blocks_succeeded: snap.blocks_succeeded,
            blocks_failed: snap.blocks_failed,
            blocks_written: snap.blocks_written,
            bytes_downloaded: snap.bytes_downloaded,
            bytes_written: snap.bytes_written,
            elapsed: self.started_at.map(|t| t.elapsed()).unwrap_or_default(),
        }
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        if self.threads.is_some() {
            let _ = self.stop();
        }
    }
}
