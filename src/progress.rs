//! Progress bar for running transfers.
//!
//! The bar only mirrors [`TransferState`] snapshots; all percent math happens
//! in the transfer crate.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use transfer::{Phase, TransferObserver, TransferState};

const TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}";

/// Progress bar driven by transfer state updates.
pub struct TransferBar {
    bar: ProgressBar,
}

impl TransferBar {
    /// Create a bar for an operation that starts in `state`.
    ///
    /// The bar is hidden when `quiet` is set or stderr is not a terminal.
    pub fn new(state: &TransferState, quiet: bool) -> Self {
        let bar = ProgressBar::new(100);
        if quiet || !console::Term::stderr().is_term() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.set_style(
            ProgressStyle::with_template(TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        let mut this = Self { bar };
        this.on_state(state);
        this
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl TransferObserver for TransferBar {
    fn on_state(&mut self, state: &TransferState) {
        self.bar.set_position(state.percent.clamp(0.0, 100.0).round() as u64);
        self.bar.set_message(status_line(state));
    }
}

impl Drop for TransferBar {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// One-line status: label, then byte counter and ETA while uploading.
pub fn status_line(state: &TransferState) -> String {
    let mut parts = vec![state.status_label.clone()];
    if state.phase == Phase::Uploading {
        if let Some(detail) = &state.detail_label {
            parts.push(detail.clone());
        }
        if let Some(eta) = &state.eta_label {
            parts.push(format!("ETA {eta}"));
        }
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" · ")
}
