//! # transfer
//!
//! Client-side core for the shrnk processing service.
//!
//! This crate provides functionality for:
//! - Submitting files to the archive and image endpoints with streamed
//!   multipart uploads
//! - A two-phase progress estimate (measured upload, then a synthetic
//!   processing phase) that never goes backwards
//! - A per-operation state machine that ignores callbacks from abandoned
//!   operations
//! - Turning a flat archive listing into a tree with multi-select
//!
//! ## Example
//!
//! ```no_run
//! use transfer::backend::http::HttpBackend;
//! use transfer::{FileHandle, OperationMode, Session, TransferOptions, TransferState};
//!
//! let mut session = Session::new(HttpBackend::with_base_url("http://localhost:8080"));
//!
//! let files = vec![FileHandle::from_path("notes.txt").unwrap()];
//! session
//!     .start(OperationMode::CreateArchive, &files, TransferOptions::new().password("secret"))
//!     .unwrap();
//!
//! let state = session.wait(&mut |s: &TransferState| println!("{:>3.0}% {}", s.percent, s.status_label));
//! if let Some(result) = &state.result {
//!     println!("download with session {}", result.session_id);
//! }
//! ```
//!
//! ## Selecting archive entries
//!
//! ```
//! use transfer::backend::{MockBackend, MockReply};
//! use transfer::{ArchiveEntry, FileHandle, OperationMode, Session, TransferOptions, TransferState};
//!
//! let mock = MockBackend::new();
//! mock.push_reply(OperationMode::Peek, MockReply::Listing(vec![
//!     ArchiveEntry::new("a/b.txt", 10, false),
//!     ArchiveEntry::new("c.txt", 5, false),
//! ]));
//!
//! let mut session = Session::new(mock);
//! let archive = FileHandle::from_bytes("a.zip", vec![0u8; 16]);
//! session.start(OperationMode::Peek, &[archive.clone()], TransferOptions::new()).unwrap();
//! session.wait(&mut |_: &TransferState| {});
//!
//! session.toggle_select("c.txt").unwrap();
//! session.extract_selected(&archive, TransferOptions::new()).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod selection;
pub mod session;
pub mod tree;
pub mod types;

pub use backend::{Backend, BackendReply, DownloadTarget, MockBackend};
pub use error::{Error, ErrorCategory, Result};
pub use orchestrator::{Directive, Dispatch, EventKind, TransferEvent, TransferOrchestrator};
pub use progress::{ProgressEstimator, SyntheticPhase};
pub use selection::SelectionStore;
pub use session::{Session, SessionConfig, TransferObserver};
pub use tree::{EntryTree, EntryTreeNode};
pub use types::{
    ArchiveEntry, FileHandle, OperationMode, OutputFile, Phase, ResizeOption, Service,
    TransferOptions, TransferResult, TransferState,
};
