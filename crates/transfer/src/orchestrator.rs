//! Transfer state machine.
//!
//! [`TransferOrchestrator`] owns the live [`TransferState`] and decides every
//! transition, but performs no IO itself. [`start`](TransferOrchestrator::start)
//! validates the request and hands back a [`Dispatch`] to send; everything the
//! outside world reports afterwards comes back as a [`TransferEvent`] stamped
//! with the generation of the operation it belongs to. Events from an
//! abandoned operation are dropped before they reach the state.
//!
//! ```text
//! Idle ──start──▶ Uploading ──flushed──▶ Processing ──reply──▶ Complete | Failed
//!                     │                      ▲
//!                     └── quick modes ───────┘
//! ```

use std::time::{Duration, Instant};

use crate::backend::{BackendReply, TransferRequest};
use crate::error::{Error, Result};
use crate::progress::{ProgressEstimator, SyntheticPhase, upload_label};
use crate::types::{FileHandle, OperationMode, Phase, TransferOptions, TransferState};

/// Identifies one operation. Bumped by every `start` and `reset`.
pub type Generation = u64;

/// What happened, as reported by the upload, the ticker or the backend.
#[derive(Debug)]
pub enum EventKind {
    /// `sent` of `total` request bytes written at `at`.
    UploadProgress {
        /// Bytes written so far.
        sent: u64,
        /// Total request bytes.
        total: u64,
        /// When the progress was observed.
        at: Instant,
    },
    /// The request body has been fully written.
    UploadFlushed,
    /// One synthetic-phase interval elapsed.
    Tick,
    /// The backend answered (or the request failed).
    Reply(Result<BackendReply>),
}

/// An event tagged with the generation it belongs to.
#[derive(Debug)]
pub struct TransferEvent {
    /// Operation the event belongs to.
    pub generation: Generation,
    /// The event itself.
    pub kind: EventKind,
}

impl TransferEvent {
    /// Tag `kind` with `generation`.
    #[must_use]
    pub fn new(generation: Generation, kind: EventKind) -> Self {
        Self { generation, kind }
    }
}

/// What the caller must do after applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Nothing.
    None,
    /// Start sending `Tick` events at this interval.
    StartTicker(Duration),
    /// Stop the ticker if one is running.
    StopTicker,
}

/// A validated request ready to send.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Generation to stamp on every event of this operation.
    pub generation: Generation,
    /// Request to hand to the backend.
    pub request: TransferRequest,
}

/// Per-operation state machine.
#[derive(Debug, Clone)]
pub struct TransferOrchestrator {
    generation: Generation,
    state: TransferState,
    estimator: ProgressEstimator,
    synthetic: SyntheticPhase,
}

impl Default for TransferOrchestrator {
    fn default() -> Self {
        Self::new(SyntheticPhase::default())
    }
}

impl TransferOrchestrator {
    /// Create an idle orchestrator.
    ///
    /// `synthetic` supplies the interval and ceiling of the processing phase;
    /// the increment is chosen per mode.
    #[must_use]
    pub fn new(synthetic: SyntheticPhase) -> Self {
        Self {
            generation: 0,
            state: TransferState::idle(),
            estimator: ProgressEstimator::new(),
            synthetic,
        }
    }

    /// The live state.
    #[must_use]
    pub fn state(&self) -> &TransferState {
        &self.state
    }

    /// Generation of the current operation.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Begin an operation.
    ///
    /// Any operation in flight is abandoned: its later events carry an old
    /// generation and are ignored. Single-file modes use only the first file.
    ///
    /// # Errors
    ///
    /// Returns a validation error and leaves the state untouched when there
    /// are no files, when `ExtractSelected` has no selected paths, or when
    /// `ResizeImages` has no resize option.
    pub fn start(
        &mut self,
        mode: OperationMode,
        files: &[FileHandle],
        options: TransferOptions,
        now: Instant,
    ) -> Result<Dispatch> {
        if files.is_empty() {
            return Err(Error::NoFiles(mode));
        }
        if mode == OperationMode::ExtractSelected && options.selected_paths.is_empty() {
            return Err(Error::NoSelection);
        }
        if mode == OperationMode::ResizeImages && options.resize.is_original() {
            return Err(Error::MissingResize);
        }

        let files = if mode.single_file() {
            if files.len() > 1 {
                log::debug!(
                    "{mode} takes one archive, ignoring {} extra file(s)",
                    files.len() - 1
                );
            }
            files[..1].to_vec()
        } else {
            files.to_vec()
        };

        if self.state.phase.is_active() {
            log::info!(
                "abandoning {} operation (generation {})",
                self.state.mode.map_or("unknown", |m| m.name()),
                self.generation
            );
        }

        self.generation += 1;
        self.estimator.begin_upload(now);

        let (phase, status) = if mode.shows_synthetic_phase() {
            (Phase::Uploading, "Uploading")
        } else {
            (Phase::Processing, mode.processing_label())
        };
        self.state = TransferState {
            mode: Some(mode),
            phase,
            percent: 0.0,
            status_label: status.to_string(),
            ..TransferState::idle()
        };

        let request = TransferRequest::new(mode, files, options);
        log::debug!(
            "dispatching {mode} to {} with {} file(s), generation {}",
            mode.endpoint(),
            request.files.len(),
            self.generation
        );

        Ok(Dispatch {
            generation: self.generation,
            request,
        })
    }

    /// Apply an event and report what the caller must do next.
    ///
    /// Events from another generation, or arriving once the operation has
    /// finished, are ignored.
    pub fn apply(&mut self, event: TransferEvent) -> Directive {
        if event.generation != self.generation || !self.state.phase.is_active() {
            log::debug!(
                "ignoring stale event for generation {} (current {}, {})",
                event.generation,
                self.generation,
                self.state.phase
            );
            return Directive::None;
        }
        let Some(mode) = self.state.mode else {
            return Directive::None;
        };

        match event.kind {
            EventKind::UploadProgress { sent, total, at } => {
                if self.state.phase == Phase::Uploading {
                    if let Some(percent) = self.estimator.on_upload_progress(sent, total) {
                        self.state.percent = percent;
                        self.state.detail_label = Some(upload_label(sent, total));
                        self.state.eta_label = Some(self.estimator.eta_label(sent, total, at));
                    }
                }
                Directive::None
            }
            EventKind::UploadFlushed => {
                if self.state.phase != Phase::Uploading {
                    return Directive::None;
                }
                let phase = self.synthetic.with_increment(mode.synthetic_increment());
                if !self.estimator.start_synthetic_phase(phase) {
                    return Directive::None;
                }
                self.state.phase = Phase::Processing;
                self.state.percent = self.estimator.percent();
                self.state.status_label = mode.processing_label().to_string();
                self.state.detail_label = None;
                self.state.eta_label = None;
                Directive::StartTicker(phase.interval)
            }
            EventKind::Tick => {
                if let Some(percent) = self.estimator.tick() {
                    self.state.percent = percent;
                }
                Directive::None
            }
            EventKind::Reply(outcome) => {
                self.finish(mode, outcome);
                Directive::StopTicker
            }
        }
    }

    /// Back to idle. In-flight work is abandoned, not cancelled.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.estimator.reset();
        self.state = TransferState::idle();
    }

    fn finish(&mut self, mode: OperationMode, outcome: Result<BackendReply>) {
        self.state.detail_label = None;
        self.state.eta_label = None;

        match outcome {
            Ok(reply) => {
                self.estimator.complete();
                self.state.phase = Phase::Complete;
                self.state.percent = self.estimator.percent();
                self.state.status_label = "Complete".to_string();
                match reply {
                    BackendReply::Artifact(result) => {
                        log::info!("{mode} complete, session {}", result.session_id);
                        self.state.result = Some(result);
                    }
                    BackendReply::Listing(entries) => {
                        log::info!("{mode} complete, {} entries", entries.len());
                        self.state.entries = Some(entries);
                    }
                }
            }
            Err(err) => {
                self.estimator.stop();
                log::warn!("{mode} failed: {err}");
                self.state.phase = Phase::Failed;
                self.state.status_label = "Failed".to_string();
                self.state.error_message = Some(err.user_message(mode));
            }
        }
    }
}
