//! Spinner that follows engine progress while tscloud waits on the remote.

use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{Phase, ProgressCallback};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(120);

/// Create a spinner, or a hidden bar when output is quiet
pub fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(TICK);
    pb
}

/// Mirrors phase changes and poll ticks onto a spinner
pub struct SpinnerProgress {
    bar: ProgressBar,
    label: String,
}

impl SpinnerProgress {
    pub fn new(label: impl Into<String>, quiet: bool) -> Self {
        let label = label.into();
        Self {
            bar: spinner(&label, quiet),
            label,
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for SpinnerProgress {
    fn on_phase(&self, id: &str, _from: Phase, to: Phase) {
        self.bar.set_message(format!("{} ({id}): {to}", self.label));
    }

    fn on_poll(&self, id: &str, attempt: u32, status: &str) {
        self.bar
            .set_message(format!("{} ({id}): {status}, poll #{attempt}", self.label));
    }
}

impl Drop for SpinnerProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
