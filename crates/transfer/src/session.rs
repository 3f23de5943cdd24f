//! Live session: the orchestrator wired to threads.
//!
//! A [`Session`] is created when the user enters a mode and dropped when they
//! leave. It owns the [`TransferOrchestrator`], the archive listing of the
//! last peek and the [`SelectionStore`] built on it.
//!
//! Backend calls run on a worker thread and the synthetic ticker on its own
//! thread. Both only send [`TransferEvent`]s into the session's channel; the
//! events are applied on the thread that calls [`Session::pump`] or
//! [`Session::wait`], so the state has a single writer.

use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use crate::backend::{Backend, DownloadTarget, TransferRequest, UploadObserver};
use crate::error::{Error, Result};
use crate::orchestrator::{Directive, EventKind, Generation, TransferEvent, TransferOrchestrator};
use crate::progress::SyntheticPhase;
use crate::selection::SelectionStore;
use crate::tree::EntryTree;
use crate::types::{FileHandle, OperationMode, Phase, TransferOptions, TransferState};

/// Session settings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionConfig {
    /// Interval and ceiling of the synthetic processing phase.
    pub synthetic: SyntheticPhase,
}

/// Receives every state the session applies.
pub trait TransferObserver {
    /// Called after each event that reached the state.
    fn on_state(&mut self, state: &TransferState);
}

impl<F: FnMut(&TransferState)> TransferObserver for F {
    fn on_state(&mut self, state: &TransferState) {
        self(state);
    }
}

/// Forwards upload notifications into the session channel.
struct ChannelObserver {
    generation: Generation,
    sender: Sender<TransferEvent>,
}

impl UploadObserver for ChannelObserver {
    fn on_progress(&self, sent: u64, total: u64) {
        let kind = EventKind::UploadProgress {
            sent,
            total,
            at: Instant::now(),
        };
        // The session may be gone; nothing left to report to.
        let _ = self.sender.send(TransferEvent::new(self.generation, kind));
    }

    fn on_flushed(&self) {
        let _ = self
            .sender
            .send(TransferEvent::new(self.generation, EventKind::UploadFlushed));
    }
}

struct Ticker {
    stop: Arc<AtomicBool>,
}

impl Ticker {
    fn spawn(generation: Generation, interval: Duration, sender: Sender<TransferEvent>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        thread::spawn(move || {
            loop {
                thread::sleep(interval);
                if flag.load(Ordering::Relaxed) {
                    break;
                }
                if sender
                    .send(TransferEvent::new(generation, EventKind::Tick))
                    .is_err()
                {
                    break;
                }
            }
        });
        Self { stop }
    }

    fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// A user session against one backend.
pub struct Session<B: Backend + 'static> {
    backend: Arc<B>,
    orchestrator: TransferOrchestrator,
    sender: Sender<TransferEvent>,
    receiver: Receiver<TransferEvent>,
    ticker: Option<Ticker>,
    tree: EntryTree,
    selection: SelectionStore,
}

impl<B: Backend + 'static> Session<B> {
    /// Create a session with default settings.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, SessionConfig::default())
    }

    /// Create a session.
    pub fn with_config(backend: B, config: SessionConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            backend: Arc::new(backend),
            orchestrator: TransferOrchestrator::new(config.synthetic),
            sender,
            receiver,
            ticker: None,
            tree: EntryTree::default(),
            selection: SelectionStore::new(),
        }
    }

    /// The backend this session talks to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The live transfer state.
    pub fn state(&self) -> &TransferState {
        self.orchestrator.state()
    }

    /// Tree of the last successful peek.
    pub fn tree(&self) -> &EntryTree {
        &self.tree
    }

    /// Selection over [`tree`](Self::tree).
    pub fn selection(&self) -> &SelectionStore {
        &self.selection
    }

    /// Mutable access to the selection, e.g. to register a listener.
    pub fn selection_mut(&mut self) -> &mut SelectionStore {
        &mut self.selection
    }

    /// Start an operation, abandoning any that is in flight.
    ///
    /// # Errors
    ///
    /// Validation errors are returned without touching the state or
    /// contacting the backend.
    pub fn start(
        &mut self,
        mode: OperationMode,
        files: &[FileHandle],
        options: TransferOptions,
    ) -> Result<Generation> {
        let dispatch = self.orchestrator.start(mode, files, options, Instant::now())?;
        self.stop_ticker();
        self.spawn_worker(dispatch.generation, dispatch.request);
        Ok(dispatch.generation)
    }

    /// Extract the currently selected entries of `archive`.
    pub fn extract_selected(
        &mut self,
        archive: &FileHandle,
        options: TransferOptions,
    ) -> Result<Generation> {
        let options = options.selected_paths(self.selection.selected().iter().cloned());
        self.start(
            OperationMode::ExtractSelected,
            std::slice::from_ref(archive),
            options,
        )
    }

    /// Fetch a finished artifact into `sink`. Returns the byte count.
    pub fn download(&self, target: &DownloadTarget, sink: &mut dyn Write) -> Result<u64> {
        self.backend.download(target, sink)
    }

    /// Apply every event already received, without blocking.
    ///
    /// Returns whether any event reached the state.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.receiver.try_recv() {
                Ok(event) => changed |= self.apply(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return changed,
            }
        }
    }

    /// Block until the current operation finishes, reporting each state.
    ///
    /// Returns immediately when nothing is in flight.
    pub fn wait(&mut self, observer: &mut dyn TransferObserver) -> &TransferState {
        while self.state().phase.is_active() {
            let Ok(event) = self.receiver.recv() else {
                break;
            };
            if self.apply(event) {
                observer.on_state(self.orchestrator.state());
            }
        }
        self.orchestrator.state()
    }

    /// Back to idle. The listing and selection are kept.
    pub fn reset(&mut self) {
        self.stop_ticker();
        self.orchestrator.reset();
    }

    /// Flip selection of a file in the listing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEntry`] when `path` is not a file of the tree.
    pub fn toggle_select(&mut self, path: &str) -> Result<bool> {
        if !self.tree.is_leaf(path) {
            return Err(Error::UnknownEntry(path.to_string()));
        }
        Ok(self.selection.toggle_select(path))
    }

    /// Flip expansion of a directory in the listing.
    pub fn toggle_expand(&mut self, path: &str) -> bool {
        self.selection.toggle_expand(path)
    }

    /// Select every file in the listing.
    pub fn select_all(&mut self) {
        self.selection.select_all(&self.tree);
    }

    /// Clear the selection.
    pub fn select_none(&mut self) {
        self.selection.select_none();
    }

    /// Expand every directory in the listing.
    pub fn expand_all(&mut self) {
        self.selection.expand_all(&self.tree);
    }

    /// Collapse every directory in the listing.
    pub fn collapse_all(&mut self) {
        self.selection.collapse_all();
    }

    fn apply(&mut self, event: TransferEvent) -> bool {
        let generation = event.generation;
        let before = self.orchestrator.state().clone();

        match self.orchestrator.apply(event) {
            Directive::None => {}
            Directive::StartTicker(interval) => {
                self.stop_ticker();
                self.ticker = Some(Ticker::spawn(generation, interval, self.sender.clone()));
            }
            Directive::StopTicker => self.stop_ticker(),
        }

        let state = self.orchestrator.state();
        if state.phase == Phase::Complete
            && before.phase != Phase::Complete
            && let Some(entries) = &state.entries
        {
            self.tree = EntryTree::build(entries);
            self.selection.retain_existing(&self.tree);
            log::debug!(
                "listing has {} entries, {} files",
                self.tree.len(),
                self.tree.leaf_count()
            );
        }

        *state != before
    }

    fn spawn_worker(&self, generation: Generation, request: TransferRequest) {
        let backend = Arc::clone(&self.backend);
        let sender = self.sender.clone();
        thread::spawn(move || {
            let observer = ChannelObserver {
                generation,
                sender: sender.clone(),
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                backend.submit(&request, &observer)
            }))
            .unwrap_or_else(|payload| Err(Error::Other(panic_message(payload.as_ref()))));
            let _ = sender.send(TransferEvent::new(generation, EventKind::Reply(outcome)));
        });
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
        }
    }
}

/// Failure text for a backend that panicked on the worker thread.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    format!("backend panicked: {detail}")
}

impl<B: Backend + 'static> Drop for Session<B> {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockReply};
    use crate::types::{ArchiveEntry, ResizeOption};
    use std::sync::Mutex;

    fn archive() -> FileHandle {
        FileHandle::from_bytes("a.zip", vec![0u8; 64])
    }

    fn fast() -> SessionConfig {
        SessionConfig {
            synthetic: SyntheticPhase {
                interval: Duration::from_millis(5),
                ..SyntheticPhase::default()
            },
        }
    }

    fn scenario_listing() -> MockReply {
        MockReply::Listing(vec![
            ArchiveEntry::new("a/b.txt", 10, false),
            ArchiveEntry::new("a/", 0, true),
            ArchiveEntry::new("c.txt", 5, false),
        ])
    }

    fn pump_until(session: &mut Session<MockBackend>, done: impl Fn(&TransferState) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(session.state()) {
            assert!(Instant::now() < deadline, "timed out in {:?}", session.state());
            session.pump();
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_extract_completes() {
        let mut session = Session::new(MockBackend::new());
        session
            .start(OperationMode::ExtractAll, &[archive()], TransferOptions::new())
            .unwrap();

        let seen: Mutex<Vec<f64>> = Mutex::new(Vec::new());
        let state = session.wait(&mut |s: &TransferState| seen.lock().unwrap().push(s.percent));
        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(state.percent, 100.0);
        assert_eq!(state.result.as_ref().unwrap().session_id, "mock-session");

        let seen = seen.into_inner().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_validation_error_sends_nothing() {
        let mut session = Session::new(MockBackend::new());
        let err = session
            .start(OperationMode::CreateArchive, &[], TransferOptions::new())
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(session.state().phase, Phase::Idle);
        assert!(!session.pump());
        assert!(session.backend().submitted().is_empty());
    }

    #[test]
    fn test_backend_error_fails_with_message() {
        let mock = MockBackend::new();
        mock.push_reply(
            OperationMode::ExtractAll,
            MockReply::status(400, Some("bad password")),
        );
        let mut session = Session::new(mock);
        session
            .start(OperationMode::ExtractAll, &[archive()], TransferOptions::new())
            .unwrap();

        let state = session.wait(&mut |_: &TransferState| {});
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.error_message.as_deref(), Some("bad password"));
    }

    #[test]
    fn test_ticker_advances_while_processing() {
        let mock = MockBackend::new();
        mock.hold();
        let mut session = Session::with_config(mock, fast());
        session
            .start(
                OperationMode::ResizeImages,
                &[FileHandle::from_bytes("p.jpg", vec![1; 10])],
                TransferOptions::new().resize(ResizeOption::Percent(50)),
            )
            .unwrap();

        pump_until(&mut session, |s| s.phase == Phase::Processing && s.percent > 50.0);
        pump_until(&mut session, |s| s.percent >= 95.0);
        assert_eq!(session.state().percent, 95.0);

        session.backend().release();
        let state = session.wait(&mut |_: &TransferState| {});
        assert_eq!(state.percent, 100.0);
    }

    #[test]
    fn test_restart_ignores_abandoned_operation() {
        let mock = MockBackend::new();
        mock.push_reply(OperationMode::ExtractAll, MockReply::artifact("first"));
        mock.push_reply(OperationMode::CreateArchive, MockReply::artifact("second"));
        mock.hold();

        let mut session = Session::with_config(mock, fast());
        let a = session
            .start(OperationMode::ExtractAll, &[archive()], TransferOptions::new())
            .unwrap();
        pump_until(&mut session, |s| s.phase == Phase::Processing);

        let b = session
            .start(
                OperationMode::CreateArchive,
                &[FileHandle::from_bytes("x.txt", vec![1])],
                TransferOptions::new(),
            )
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(session.state().mode, Some(OperationMode::CreateArchive));

        session.backend().release();
        let state = session.wait(&mut |s: &TransferState| {
            assert_eq!(s.mode, Some(OperationMode::CreateArchive));
        });
        assert_eq!(state.result.as_ref().unwrap().session_id, "second");

        // A's late reply and ticks must not disturb the finished state.
        thread::sleep(Duration::from_millis(30));
        session.pump();
        assert_eq!(session.state().phase, Phase::Complete);
        assert_eq!(session.state().result.as_ref().unwrap().session_id, "second");
    }

    #[test]
    fn test_peek_builds_tree_and_selects() {
        let mock = MockBackend::new();
        mock.push_reply(OperationMode::Peek, scenario_listing());
        let mut session = Session::new(mock);

        session
            .start(OperationMode::Peek, &[archive()], TransferOptions::new())
            .unwrap();
        session.wait(&mut |_: &TransferState| {});

        assert_eq!(session.tree().leaf_count(), 2);
        session.select_all();
        assert_eq!(session.selection().selected(), ["a/b.txt", "c.txt"]);

        assert!(matches!(
            session.toggle_select("a"),
            Err(Error::UnknownEntry(_))
        ));
        assert!(!session.toggle_select("c.txt").unwrap());

        session.extract_selected(&archive(), TransferOptions::new()).unwrap();
        session.wait(&mut |_: &TransferState| {});

        let submitted = session.backend().submitted();
        let last = submitted.last().unwrap();
        assert_eq!(last.mode, OperationMode::ExtractSelected);
        assert_eq!(
            last.text_fields,
            [("paths".to_string(), "a/b.txt".to_string())]
        );
    }

    #[test]
    fn test_extract_selected_without_selection() {
        let mut session = Session::new(MockBackend::new());
        let err = session
            .extract_selected(&archive(), TransferOptions::new())
            .unwrap_err();
        assert!(matches!(err, Error::NoSelection));
        assert_eq!(session.state().phase, Phase::Idle);
    }

    #[test]
    fn test_failure_keeps_selection() {
        let mock = MockBackend::new();
        mock.push_reply(OperationMode::Peek, scenario_listing());
        mock.push_reply(
            OperationMode::ExtractSelected,
            MockReply::Transport("connection reset".to_string()),
        );
        let mut session = Session::new(mock);
        session
            .start(OperationMode::Peek, &[archive()], TransferOptions::new())
            .unwrap();
        session.wait(&mut |_: &TransferState| {});
        session.toggle_select("c.txt").unwrap();
        session.toggle_expand("a");

        session.extract_selected(&archive(), TransferOptions::new()).unwrap();
        let state = session.wait(&mut |_: &TransferState| {});
        assert_eq!(state.error_message.as_deref(), Some("Network error"));
        assert_eq!(session.selection().selected(), ["c.txt"]);
        assert!(session.selection().is_expanded("a"));
    }

    #[test]
    fn test_download_through_session() {
        let mock = MockBackend::new();
        mock.add_artifact("s1", b"zip bytes".to_vec());
        let session = Session::new(mock);

        let mut out = Vec::new();
        let target = DownloadTarget::new(crate::types::Service::Archive, "s1");
        assert_eq!(session.download(&target, &mut out).unwrap(), 9);
        assert_eq!(out, b"zip bytes");
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mock = MockBackend::new();
        mock.hold();
        let mut session = Session::with_config(mock, fast());
        session
            .start(OperationMode::ExtractAll, &[archive()], TransferOptions::new())
            .unwrap();
        pump_until(&mut session, |s| s.phase == Phase::Processing);

        session.reset();
        assert_eq!(session.state(), &TransferState::idle());

        session.backend().release();
        thread::sleep(Duration::from_millis(30));
        session.pump();
        assert_eq!(session.state().phase, Phase::Idle);
    }

    struct PanickingBackend;

    impl Backend for PanickingBackend {
        fn submit(
            &self,
            _request: &TransferRequest,
            _observer: &dyn UploadObserver,
        ) -> Result<crate::backend::BackendReply> {
            panic!("connection pool poisoned");
        }

        fn download(&self, _target: &DownloadTarget, _sink: &mut dyn Write) -> Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn test_backend_panic_fails_operation() {
        let mut session = Session::with_config(PanickingBackend, fast());
        session
            .start(OperationMode::ExtractAll, &[archive()], TransferOptions::new())
            .unwrap();

        let state = session.wait(&mut |_: &TransferState| {}).clone();
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(
            state.error_message.as_deref(),
            Some("backend panicked: connection pool poisoned")
        );
    }
}
