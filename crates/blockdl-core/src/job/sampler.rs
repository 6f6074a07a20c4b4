//! Progress sampler loop.

use std::time::Duration;

use super::shared::JobShared;
use crate::progress::SpeedWindow;

/// Samples counters every `interval` into a window of `window` samples and
/// publishes the derived speeds. Exits once the job stops or finishes, after
/// taking a final sample.
pub(super) fn run_sampler(shared: &JobShared, interval: Duration, window: usize) {
    let mut samples = SpeedWindow::new(window);
    loop {
        samples.push(shared.sample());
        shared.set_speeds(samples.speeds());
        if !shared.is_running() || shared.is_finished() {
            break;
        }
        shared.pause(interval);
    }
}
