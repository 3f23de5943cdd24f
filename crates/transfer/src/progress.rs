//! Progress estimation.
//!
//! The backend does not stream processing progress, so overall progress is
//! modeled in two halves: the measured upload fills 0–50, then a synthetic
//! phase creeps from 50 towards a ceiling until the reply arrives. The
//! percent reported here never decreases until [`ProgressEstimator::reset`].

use std::time::{Duration, Instant};

/// Share of the total progress attributed to the upload.
pub const UPLOAD_SHARE: f64 = 50.0;

/// Settings of the synthetic processing phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticPhase {
    /// Percent the phase starts from.
    pub initial: f64,
    /// Percent points added per tick.
    pub increment: f64,
    /// Time between ticks.
    pub interval: Duration,
    /// Percent the phase never exceeds.
    pub ceiling: f64,
}

impl Default for SyntheticPhase {
    fn default() -> Self {
        Self {
            initial: UPLOAD_SHARE,
            increment: 2.0,
            interval: Duration::from_millis(200),
            ceiling: 95.0,
        }
    }
}

impl SyntheticPhase {
    /// Same phase with a different increment.
    #[must_use]
    pub fn with_increment(mut self, increment: f64) -> Self {
        self.increment = increment;
        self
    }
}

/// Monotonic percent estimate for one operation.
#[derive(Debug, Clone, Default)]
pub struct ProgressEstimator {
    percent: f64,
    synthetic: Option<SyntheticPhase>,
    upload_started: Option<Instant>,
}

impl ProgressEstimator {
    /// Create an estimator at 0%.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current percent.
    #[must_use]
    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// Whether the synthetic phase is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.synthetic.is_some()
    }

    /// Back to 0% with nothing running.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Start measuring an upload that begins at `now`.
    pub fn begin_upload(&mut self, now: Instant) {
        self.reset();
        self.upload_started = Some(now);
    }

    /// Record upload byte progress. Ignored while `total` is 0.
    ///
    /// Maps `sent / total` onto 0–50 and returns the new percent.
    pub fn on_upload_progress(&mut self, sent: u64, total: u64) -> Option<f64> {
        if total == 0 {
            return None;
        }
        let fraction = (sent as f64 / total as f64).clamp(0.0, 1.0);
        self.advance_to(UPLOAD_SHARE * fraction);
        Some(self.percent)
    }

    /// Time left for the upload, extrapolated from the rate so far.
    #[must_use]
    pub fn eta_label(&self, sent: u64, total: u64, now: Instant) -> String {
        match self.upload_started {
            Some(started) => estimate_eta(now.saturating_duration_since(started), sent, total),
            None => CALCULATING.to_string(),
        }
    }

    /// Start the synthetic phase.
    ///
    /// Returns `false` and changes nothing if it is already running.
    pub fn start_synthetic_phase(&mut self, phase: SyntheticPhase) -> bool {
        if self.synthetic.is_some() {
            return false;
        }
        self.advance_to(phase.initial.min(phase.ceiling));
        self.synthetic = Some(phase);
        true
    }

    /// Advance the synthetic phase by one increment, clamped to its ceiling.
    ///
    /// Returns `None` when the phase is not running.
    pub fn tick(&mut self) -> Option<f64> {
        let phase = self.synthetic?;
        self.advance_to((self.percent + phase.increment).min(phase.ceiling));
        Some(self.percent)
    }

    /// Halt the synthetic phase. Returns whether it was running.
    pub fn stop(&mut self) -> bool {
        self.synthetic.take().is_some()
    }

    /// Stop and jump to 100%.
    pub fn complete(&mut self) {
        self.stop();
        self.percent = 100.0;
    }

    fn advance_to(&mut self, target: f64) {
        if target > self.percent {
            self.percent = target.min(100.0);
        }
    }
}

const CALCULATING: &str = "Calculating...";

/// Estimate remaining time from `sent` of `total` bytes in `elapsed`.
///
/// Returns "Calculating..." until there is a rate to extrapolate from, then
/// "< 1s", "42s" or "3m 5s".
#[must_use]
pub fn estimate_eta(elapsed: Duration, sent: u64, total: u64) -> String {
    let elapsed_ms = elapsed.as_millis();
    if sent == 0 || elapsed_ms == 0 {
        return CALCULATING.to_string();
    }
    let remaining = u128::from(total.saturating_sub(sent));
    let eta_ms = remaining * elapsed_ms / u128::from(sent);
    format_eta_ms(eta_ms)
}

fn format_eta_ms(eta_ms: u128) -> String {
    if eta_ms < 1_000 {
        "< 1s".to_string()
    } else if eta_ms < 60_000 {
        format!("{}s", eta_ms / 1_000)
    } else {
        format!("{}m {}s", eta_ms / 60_000, (eta_ms % 60_000) / 1_000)
    }
}

/// Byte counter shown while uploading, in megabytes.
#[must_use]
pub fn upload_label(sent: u64, total: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    format!("{:.1} MB / {:.1} MB", sent as f64 / MB, total as f64 / MB)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(increment: f64) -> SyntheticPhase {
        SyntheticPhase::default().with_increment(increment)
    }

    #[test]
    fn test_upload_fraction_maps_to_half() {
        let mut est = ProgressEstimator::new();
        assert_eq!(est.on_upload_progress(50, 100), Some(25.0));
        assert_eq!(est.on_upload_progress(100, 100), Some(50.0));
    }

    #[test]
    fn test_upload_ignored_without_total() {
        let mut est = ProgressEstimator::new();
        assert_eq!(est.on_upload_progress(10, 0), None);
        assert_eq!(est.percent(), 0.0);
    }

    #[test]
    fn test_upload_clamped() {
        let mut est = ProgressEstimator::new();
        assert_eq!(est.on_upload_progress(500, 100), Some(50.0));
    }

    #[test]
    fn test_upload_never_decreases() {
        let mut est = ProgressEstimator::new();
        est.on_upload_progress(80, 100);
        est.on_upload_progress(20, 100);
        assert_eq!(est.percent(), 40.0);
    }

    #[test]
    fn test_synthetic_phase_starts_at_fifty() {
        let mut est = ProgressEstimator::new();
        est.on_upload_progress(10, 100);
        assert!(est.start_synthetic_phase(phase(3.0)));
        assert_eq!(est.percent(), 50.0);
        assert_eq!(est.tick(), Some(53.0));
    }

    #[test]
    fn test_synthetic_phase_is_idempotent() {
        let mut est = ProgressEstimator::new();
        assert!(est.start_synthetic_phase(phase(2.0)));
        est.tick();
        assert!(!est.start_synthetic_phase(phase(10.0)));
        assert_eq!(est.tick(), Some(54.0));
    }

    #[test]
    fn test_synthetic_phase_clamps_to_ceiling() {
        let mut est = ProgressEstimator::new();
        est.start_synthetic_phase(phase(3.0));
        for _ in 0..100 {
            est.tick();
        }
        assert_eq!(est.percent(), 95.0);
    }

    #[test]
    fn test_tick_after_stop_is_ignored() {
        let mut est = ProgressEstimator::new();
        est.start_synthetic_phase(phase(2.0));
        assert!(est.stop());
        assert!(!est.stop());
        assert_eq!(est.tick(), None);
        assert_eq!(est.percent(), 50.0);
    }

    #[test]
    fn test_complete_and_reset() {
        let mut est = ProgressEstimator::new();
        est.start_synthetic_phase(phase(2.0));
        est.complete();
        assert_eq!(est.percent(), 100.0);
        assert!(!est.is_running());

        est.reset();
        assert_eq!(est.percent(), 0.0);
    }

    #[test]
    fn test_monotonic_across_sequence() {
        let mut est = ProgressEstimator::new();
        let mut last = est.percent();
        for sent in [0, 10, 10, 40, 90, 100] {
            est.on_upload_progress(sent, 100);
            assert!(est.percent() >= last);
            last = est.percent();
        }
        est.start_synthetic_phase(phase(3.0));
        for _ in 0..40 {
            est.tick();
            assert!(est.percent() >= last);
            last = est.percent();
        }
        est.complete();
        assert!(est.percent() >= last);
    }

    #[test]
    fn test_estimate_eta() {
        assert_eq!(estimate_eta(Duration::from_secs(1), 0, 100), "Calculating...");
        assert_eq!(estimate_eta(Duration::ZERO, 10, 100), "Calculating...");
        assert_eq!(estimate_eta(Duration::from_secs(1), 99, 100), "< 1s");
        assert_eq!(estimate_eta(Duration::from_secs(10), 50, 100), "10s");
        assert_eq!(estimate_eta(Duration::from_secs(65), 50, 100), "1m 5s");
    }

    #[test]
    fn test_eta_label_before_upload() {
        let est = ProgressEstimator::new();
        assert_eq!(est.eta_label(1, 2, Instant::now()), "Calculating...");
    }

    #[test]
    fn test_upload_label() {
        assert_eq!(upload_label(1024 * 1024, 10 * 1024 * 1024), "1.0 MB / 10.0 MB");
        assert_eq!(upload_label(0, 0), "0.0 MB / 0.0 MB");
    }
}
