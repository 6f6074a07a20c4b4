//! Progress samples and derived throughput.
//!
//! The sampler thread pushes a [`ProgressSample`] into a [`SpeedWindow`]
//! every interval; speeds are the byte deltas over the window's
//! oldest-to-newest span. Consumers read a [`ProgressSnapshot`].

use std::collections::VecDeque;
use std::time::Instant;

/// Cumulative byte counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    pub at: Instant,
    pub bytes_written: u64,
    pub bytes_downloaded: u64,
}

/// Derived rates in bytes per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Speeds {
    pub download_bytes_per_sec: f64,
    pub write_bytes_per_sec: f64,
}

/// Bounded rolling window of samples (oldest first).
#[derive(Debug, Clone)]
pub struct SpeedWindow {
    samples: VecDeque<ProgressSample>,
    capacity: usize,
}

impl SpeedWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        SpeedWindow {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a sample, evicting the oldest once the window is full.
    pub fn push(&mut self, sample: ProgressSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.samples.len()
    }

    /// Rates over the oldest-to-newest span; zero until two samples with
    /// distinct timestamps exist.
    pub fn speeds(&self) -> Speeds {
        let (Some(oldest), Some(newest)) = (self.samples.front(), self.samples.back()) else {
            return Speeds::default();
        };
        let dt = newest.at.saturating_duration_since(oldest.at).as_secs_f64();
        if dt <= 0.0 {
            return Speeds::default();
        }
        Speeds {
            download_bytes_per_sec: newest.bytes_downloaded.saturating_sub(oldest.bytes_downloaded)
                as f64
                / dt,
            write_bytes_per_sec: newest.bytes_written.saturating_sub(oldest.bytes_written) as f64
                / dt,
        }
    }
}

/// Read-only view of a job's progress (CLI/UI friendly).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressSnapshot {
    /// Remote object size in bytes (0 until probed).
    pub total_bytes: u64,
    /// Bytes found already written by the resume scan.
    pub bytes_present: u64,
    /// Bytes fetched this run (full range length per successful block).
    pub bytes_downloaded: u64,
    /// Bytes persisted this run.
    pub bytes_written: u64,
    /// Bytes still to be written this run.
    pub bytes_remaining: u64,
    pub speeds: Speeds,
    pub blocks_total: usize,
    pub blocks_succeeded: usize,
    pub blocks_failed: usize,
    pub blocks_written: usize,
}

impl ProgressSnapshot {
    /// Estimated seconds remaining (None while the write rate is 0).
    pub fn eta_secs(&self) -> Option<f64> {
        if self.bytes_remaining == 0 {
            return Some(0.0);
        }
        let rate = self.speeds.write_bytes_per_sec;
        if rate <= 0.0 {
            return None;
        }
        Some(self.bytes_remaining as f64 / rate)
    }

    /// Fraction of the object on disk, counting resumed blocks, in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        ((self.bytes_present + self.bytes_written) as f64 / self.total_bytes as f64).min(1.0)
    }
}
