//! indicatif-backed progress sinks.
//!
//! One percent-scale bar per pipeline phase, driven by the engines'
//! progress events.

use gds_core::progress::ProgressSink;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for one pipeline phase, positioned 0-100.
pub struct PhaseBar {
    bar: ProgressBar,
}

impl PhaseBar {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(bar_style());
        bar.set_prefix(format!("{label:>9}"));
        Self { bar }
    }
}

impl ProgressSink for PhaseBar {
    fn start(&self) {
        self.bar.set_position(0);
    }

    fn progress(&self, percent: f64) {
        self.bar.set_position(percent.clamp(0.0, 100.0) as u64);
    }

    fn done(&self) {
        self.bar.finish();
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {percent:>3}% | ETA: {eta}")
        .expect("Invalid template")
        .progress_chars("█▓░")
}
