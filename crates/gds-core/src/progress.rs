//! Progress reporting capability.
//!
//! Engines report lifecycle and byte progress through a [`ProgressSink`]
//! supplied by the caller, so presentation (progress bars, log lines, no-op
//! in tests) stays out of the engines entirely.

/// Receiver for one engine phase's lifecycle events.
///
/// Contract: `start` is called once before any `progress` event, `progress`
/// values are percentages in `[0, 100]` and non-decreasing, and `done` is
/// called once after the final event. When the phase has work to do the last
/// `progress` value is exactly `100`.
pub trait ProgressSink: Send + Sync {
    /// The phase began.
    fn start(&self);

    /// Bytes were processed; `percent` is the cumulative share done.
    fn progress(&self, percent: f64);

    /// The phase finished.
    fn done(&self);
}

/// Sink that ignores every event. Default for headless and test use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn start(&self) {}
    fn progress(&self, _percent: f64) {}
    fn done(&self) {}
}

/// Percentage of `total` covered by `processed`, rounded to two decimal
/// places and clamped to 100.
///
/// A zero total counts as already complete: an empty denominator must never
/// surface as a division artifact.
pub fn percent(processed: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let raw = processed as f64 * 100.0 / total as f64;
    ((raw * 100.0).round() / 100.0).min(100.0)
}
