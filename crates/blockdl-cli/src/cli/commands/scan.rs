//! `blockdl scan` – read-only resume scan of a destination file.

use anyhow::Result;
use blockdl_core::config::BlockdlConfig;
use blockdl_core::{CurlTransport, Job, JobRequest};
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run_scan(cfg: &BlockdlConfig, url: &str, output: PathBuf) -> Result<()> {
    let request = JobRequest {
        url: url.to_string(),
        destination: output,
        block_size: cfg.block_size_bytes(),
        workers: cfg.workers,
    };
    let mut job = Job::new(request, Arc::new(CurlTransport::new()), cfg.job_settings())?;

    let (plan, dl) = tokio::task::spawn_blocking(move || -> Result<_> {
        let plan = job.plan()?;
        Ok((plan, job.download_job().clone()))
    })
    .await??;

    let layout = dl.layout();
    println!("{}", dl.destination.display());
    println!(
        "  size {} bytes, {} block(s) of {} bytes{}",
        dl.total_size,
        layout.block_count(),
        layout.block_size(),
        if dl.accepts_ranges { "" } else { " (no range support)" }
    );
    println!("  present: {}", plan.present);
    println!("  missing: {}", plan.missing.len());
    if !plan.missing.is_empty() {
        println!("  missing blocks: {}", compact_indices(&plan.missing));
    }
    Ok(())
}

/// Sorted indices as runs, e.g. `[0, 1, 2, 5, 7, 8]` -> `"0-2, 5, 7-8"`.
pub(crate) fn compact_indices(indices: &[usize]) -> String {
    fn run(a: usize, b: usize) -> String {
        if a == b {
            a.to_string()
        } else {
            format!("{}-{}", a, b)
        }
    }

    let mut iter = indices.iter().copied();
    let Some(mut start) = iter.next() else {
        return String::new();
    };
    let mut runs = Vec::new();
    let mut prev = start;
    for i in iter {
        if i != prev + 1 {
            runs.push(run(start, prev));
            start = i;
        }
        prev = i;
    }
    runs.push(run(start, prev));
    runs.join(", ")
}
