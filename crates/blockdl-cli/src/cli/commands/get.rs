//! `blockdl get` – download (or resume) one URL with a live progress line.

use anyhow::Result;
use blockdl_core::config::BlockdlConfig;
use blockdl_core::naming;
use blockdl_core::{CurlTransport, Job, JobReport, JobRequest, JobState, ProgressSnapshot};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Exit status when some blocks failed permanently.
const EXIT_BLOCKS_FAILED: u8 = 2;
/// Exit status when interrupted before finishing (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

pub async fn run_get(cfg: &BlockdlConfig, url: &str, output: Option<PathBuf>) -> Result<ExitCode> {
    let derive_name = output.is_none();
    let cwd = std::env::current_dir()?;
    let destination = output.unwrap_or_else(|| naming::destination_in(&cwd, url, None));
    let request = JobRequest {
        url: url.to_string(),
        destination,
        block_size: cfg.block_size_bytes(),
        workers: cfg.workers,
    };
    let mut job = Job::new(request, Arc::new(CurlTransport::new()), cfg.job_settings())?;

    // Probe, name and start off the runtime: these block on HTTP and disk.
    let url_owned = url.to_string();
    let mut job = tokio::task::spawn_blocking(move || -> Result<Job> {
        let cd = job.probe()?.content_disposition.clone();
        if derive_name {
            job.set_destination(naming::destination_in(&cwd, &url_owned, cd.as_deref()))?;
        }
        job.start()?;
        Ok(job)
    })
    .await??;

    let handle = job.handle();
    let dl = job.download_job().clone();
    println!(
        "{} -> {} ({} bytes)",
        dl.url,
        dl.destination.display(),
        dl.total_size
    );

    let mut waiter = tokio::task::spawn_blocking(move || job.wait());
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    // Re-armed after each press so a second Ctrl-C is not swallowed.
    let mut ctrl_c = Box::pin(tokio::signal::ctrl_c());
    let mut presses = 0u32;

    let report = loop {
        tokio::select! {
            joined = &mut waiter => break joined??,
            _ = ticker.tick() => {
                eprint!("\r{}", format_progress(&handle.snapshot()));
                let _ = std::io::stderr().flush();
            }
            _ = &mut ctrl_c => {
                presses += 1;
                ctrl_c = Box::pin(tokio::signal::ctrl_c());
                match on_interrupt(presses) {
                    Interrupt::Stop => {
                        eprintln!("\nstopping; in-flight blocks will finish first (Ctrl-C again to quit now)");
                        tracing::info!("interrupt received, stopping job");
                        handle.request_stop();
                    }
                    Interrupt::Abort => {
                        eprintln!("\ninterrupted again; exiting without waiting");
                        tracing::warn!("second interrupt, exiting immediately");
                        // Blocking fetches would hold up runtime shutdown.
                        std::process::exit(i32::from(EXIT_INTERRUPTED));
                    }
                }
            }
        }
    };
    eprintln!("\r{}", format_progress(&handle.snapshot()));

    print_summary(&report);
    Ok(ExitCode::from(exit_status(&report)))
}

fn print_summary(report: &JobReport) {
    match report.state {
        JobState::Finished if report.blocks_failed == 0 => println!(
            "done: {} bytes written in {:.1}s ({} block(s) already present)",
            report.bytes_written,
            report.elapsed.as_secs_f64(),
            report.blocks_present
        ),
        JobState::Finished => println!(
            "finished with {} failed block(s) of {}; run again to retry them",
            report.blocks_failed, report.blocks_total
        ),
        _ => println!(
            "stopped: {} of {} block(s) written; run again to resume",
            report.blocks_written, report.blocks_total
        ),
    }
}

/// What a Ctrl-C press does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupt {
    /// Ask the job to stop cooperatively.
    Stop,
    /// Exit the process without waiting for the job.
    Abort,
}

/// `presses` counts this one.
pub(crate) fn on_interrupt(presses: u32) -> Interrupt {
    if presses <= 1 {
        Interrupt::Stop
    } else {
        Interrupt::Abort
    }
}

pub(crate) fn exit_status(report: &JobReport) -> u8 {
    match report.state {
        JobState::Finished if report.blocks_failed == 0 => 0,
        JobState::Finished => EXIT_BLOCKS_FAILED,
        _ => EXIT_INTERRUPTED,
    }
}

/// One-line progress: done/total MiB, percent, download and write rates, ETA.
pub(crate) fn format_progress(snap: &ProgressSnapshot) -> String {
    const MIB: f64 = 1_048_576.0;
    let done = (snap.bytes_present + snap.bytes_written) as f64 / MIB;
    let total = snap.total_bytes as f64 / MIB;
    let eta = snap
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    let failed = if snap.blocks_failed > 0 {
        format!("  {} failed", snap.blocks_failed)
    } else {
        String::new()
    };
    format!(
        "  {:.1} / {:.1} MiB ({:.1}%)  dl {:.2} MiB/s  wr {:.2} MiB/s  ETA {}{}  ",
        done,
        total,
        snap.fraction() * 100.0,
        snap.speeds.download_bytes_per_sec / MIB,
        snap.speeds.write_bytes_per_sec / MIB,
        eta,
        failed
    )
}
