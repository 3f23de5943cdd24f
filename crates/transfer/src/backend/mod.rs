//! Backend trait and implementations for the processing service.
//!
//! The [`Backend`] trait is the only way the core reaches the remote
//! service. [`http::HttpBackend`] talks to the real service over HTTP;
//! [`MockBackend`] answers from memory for tests and offline use.
//!
//! # Testing
//!
//! ```
//! use transfer::backend::{Backend, MockBackend, MockReply, NoopObserver, TransferRequest};
//! use transfer::{FileHandle, OperationMode, TransferOptions};
//!
//! let mock = MockBackend::new();
//! mock.push_reply(OperationMode::ExtractAll, MockReply::status(400, Some("bad password")));
//!
//! let request = TransferRequest::new(
//!     OperationMode::ExtractAll,
//!     vec![FileHandle::from_bytes("a.zip", vec![0u8; 4])],
//!     TransferOptions::new(),
//! );
//! assert!(mock.submit(&request, &NoopObserver).is_err());
//! ```

pub mod http;
pub mod multipart;

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::types::{
    ArchiveEntry, FileHandle, OperationMode, Service, TransferOptions, TransferResult,
};

/// Receives upload notifications from a backend while a request is sent.
pub trait UploadObserver: Sync {
    /// `sent` of `total` request bytes have been written.
    fn on_progress(&self, sent: u64, total: u64);

    /// The whole request body has been written; the backend is working.
    fn on_flushed(&self);
}

/// Observer that ignores every notification.
pub struct NoopObserver;

impl UploadObserver for NoopObserver {
    fn on_progress(&self, _sent: u64, _total: u64) {}
    fn on_flushed(&self) {}
}

/// Value of one multipart form field.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// Plain text field.
    Text(String),
    /// File upload field.
    File(FileHandle),
}

/// A named multipart form field.
#[derive(Debug, Clone)]
pub struct FormField {
    /// Field name.
    pub name: &'static str,
    /// Field value.
    pub value: FieldValue,
}

impl FormField {
    fn text(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: FieldValue::Text(value.into()),
        }
    }

    fn file(name: &'static str, handle: &FileHandle) -> Self {
        Self {
            name,
            value: FieldValue::File(handle.clone()),
        }
    }
}

/// A fully assembled request for one operation.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Operation to run.
    pub mode: OperationMode,
    /// Input files, already narrowed to one for single-file modes.
    pub files: Vec<FileHandle>,
    /// Options for the operation.
    pub options: TransferOptions,
}

impl TransferRequest {
    /// Create a request.
    #[must_use]
    pub fn new(mode: OperationMode, files: Vec<FileHandle>, options: TransferOptions) -> Self {
        Self {
            mode,
            files,
            options,
        }
    }

    /// Form fields the endpoint of this mode expects, in send order.
    #[must_use]
    pub fn form_fields(&self) -> Vec<FormField> {
        let opts = &self.options;
        let mut fields = Vec::new();

        match self.mode {
            OperationMode::CreateArchive => {
                fields.extend(self.files.iter().map(|f| FormField::file("files", f)));
                if let Some(pw) = opts.effective_password() {
                    fields.push(FormField::text("password", pw));
                }
                if !opts.resize.is_original() {
                    fields.push(FormField::text("resizeOption", opts.resize.form_value()));
                }
                fields.push(FormField::text("stripMetadata", opts.strip_metadata.to_string()));
            }
            OperationMode::ExtractAll | OperationMode::Peek => {
                fields.extend(self.files.first().map(|f| FormField::file("file", f)));
                if let Some(pw) = opts.effective_password() {
                    fields.push(FormField::text("password", pw));
                }
            }
            OperationMode::ExtractSelected => {
                fields.extend(self.files.first().map(|f| FormField::file("file", f)));
                fields.extend(opts.selected_paths.iter().map(|p| FormField::text("paths", p)));
                if let Some(pw) = opts.effective_password() {
                    fields.push(FormField::text("password", pw));
                }
            }
            OperationMode::ResizeImages => {
                fields.extend(self.files.iter().map(|f| FormField::file("files", f)));
                fields.push(FormField::text("resizeOption", opts.resize.form_value()));
                fields.push(FormField::text("stripMetadata", opts.strip_metadata.to_string()));
            }
            OperationMode::StripMetadataOnly => {
                fields.extend(self.files.iter().map(|f| FormField::file("files", f)));
            }
        }

        fields
    }

    /// Total size of the input files.
    #[must_use]
    pub fn input_bytes(&self) -> u64 {
        self.files.iter().map(FileHandle::size_bytes).sum()
    }
}

/// Parsed success reply of the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendReply {
    /// An artifact is ready for download.
    Artifact(TransferResult),
    /// Archive members listed by a peek.
    Listing(Vec<ArchiveEntry>),
}

/// Where to fetch a finished artifact from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Service that produced the artifact.
    pub service: Service,
    /// Backend-issued session id.
    pub session_id: String,
    /// Single output file to fetch (image service only).
    pub path: Option<String>,
}

impl DownloadTarget {
    /// Target the default artifact of a session.
    #[must_use]
    pub fn new(service: Service, session_id: impl Into<String>) -> Self {
        Self {
            service,
            session_id: session_id.into(),
            path: None,
        }
    }

    /// Fetch one named output file instead of the default artifact.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Route of the download endpoint, relative to the base URL.
    #[must_use]
    pub fn route(&self) -> String {
        format!("/api/{}/download/{}", self.service.segment(), self.session_id)
    }
}

/// Backend trait for the processing service.
///
/// Implementations are called from worker threads, so they must be
/// `Send + Sync`.
pub trait Backend: Send + Sync {
    /// Send a request and wait for the reply.
    ///
    /// Upload progress is reported to `observer` in non-decreasing order,
    /// followed by one `on_flushed` once the body is written.
    ///
    /// # Errors
    ///
    /// Returns `Error::Backend` for an error status, `Error::Transport` when
    /// the service cannot be reached and `Error::InvalidResponse` when a
    /// success body cannot be parsed.
    fn submit(&self, request: &TransferRequest, observer: &dyn UploadObserver)
    -> Result<BackendReply>;

    /// Stream a finished artifact into `sink`. Returns the byte count.
    fn download(&self, target: &DownloadTarget, sink: &mut dyn Write) -> Result<u64>;
}

/// Scripted reply for [`MockBackend`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Success with an artifact.
    Artifact(TransferResult),
    /// Success with an archive listing.
    Listing(Vec<ArchiveEntry>),
    /// Error status with an optional `{error}` message.
    Status {
        /// HTTP status code.
        status: u16,
        /// Message from the error body.
        message: Option<String>,
    },
    /// Connection failure.
    Transport(String),
    /// Success status with an unparseable body.
    Malformed(String),
}

impl MockReply {
    /// Success with a bare artifact for `session_id`.
    #[must_use]
    pub fn artifact(session_id: impl Into<String>) -> Self {
        Self::Artifact(TransferResult {
            session_id: session_id.into(),
            file_name: None,
            total_files: None,
            size_bytes: None,
            output_files: Vec::new(),
        })
    }

    /// Error status reply.
    #[must_use]
    pub fn status(status: u16, message: Option<&str>) -> Self {
        Self::Status {
            status,
            message: message.map(str::to_string),
        }
    }

    fn into_result(self) -> Result<BackendReply> {
        match self {
            Self::Artifact(r) => Ok(BackendReply::Artifact(r)),
            Self::Listing(e) => Ok(BackendReply::Listing(e)),
            Self::Status { status, message } => Err(Error::backend(status, message)),
            Self::Transport(m) => Err(Error::Transport(m)),
            Self::Malformed(m) => Err(Error::InvalidResponse(m)),
        }
    }
}

/// A request as seen by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedRequest {
    /// Operation requested.
    pub mode: OperationMode,
    /// Names of uploaded files, in field order.
    pub file_names: Vec<String>,
    /// Text fields as (name, value), in field order.
    pub text_fields: Vec<(String, String)>,
}

/// Blocks mock replies until released.
#[derive(Debug, Default)]
struct Gate {
    held: Mutex<bool>,
    released: Condvar,
}

/// Mock backend for testing without network access.
///
/// Replies are scripted per mode and consumed in order; a mode without a
/// scripted reply succeeds with a default artifact (or an empty listing for
/// peeks). Replies can be held back with [`MockBackend::hold`] to keep an
/// operation in flight.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    replies: Arc<Mutex<HashMap<OperationMode, VecDeque<MockReply>>>>,
    submitted: Arc<Mutex<Vec<SubmittedRequest>>>,
    artifacts: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    gate: Arc<Gate>,
}

impl MockBackend {
    /// Create a new mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next submission of `mode`.
    pub fn push_reply(&self, mode: OperationMode, reply: MockReply) {
        let mut replies = self.replies.lock().unwrap_or_else(PoisonError::into_inner);
        replies.entry(mode).or_default().push_back(reply);
    }

    /// Store artifact bytes for a session id.
    pub fn add_artifact(&self, session_id: impl Into<String>, data: Vec<u8>) {
        let mut artifacts = self.artifacts.lock().unwrap_or_else(PoisonError::into_inner);
        artifacts.insert(session_id.into(), data);
    }

    /// Hold replies: submissions upload and flush, then wait for [`release`](Self::release).
    pub fn hold(&self) {
        *self.gate.held.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    /// Let held and future submissions reply.
    pub fn release(&self) {
        *self.gate.held.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.gate.released.notify_all();
    }

    /// Requests received so far.
    #[must_use]
    pub fn submitted(&self) -> Vec<SubmittedRequest> {
        self.submitted.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn wait_for_release(&self) {
        let mut held = self.gate.held.lock().unwrap_or_else(PoisonError::into_inner);
        while *held {
            held = self.gate.released.wait(held).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Backend for MockBackend {
    fn submit(
        &self,
        request: &TransferRequest,
        observer: &dyn UploadObserver,
    ) -> Result<BackendReply> {
        let mut file_names = Vec::new();
        let mut text_fields = Vec::new();
        for field in request.form_fields() {
            match field.value {
                FieldValue::File(f) => file_names.push(f.name().to_string()),
                FieldValue::Text(t) => text_fields.push((field.name.to_string(), t)),
            }
        }
        self.submitted.lock().unwrap_or_else(PoisonError::into_inner).push(SubmittedRequest {
            mode: request.mode,
            file_names,
            text_fields,
        });

        let total = request.input_bytes();
        let mut sent = 0;
        for file in &request.files {
            sent += file.size_bytes();
            observer.on_progress(sent, total);
        }
        observer.on_flushed();

        self.wait_for_release();

        let scripted = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&request.mode)
            .and_then(VecDeque::pop_front);

        match scripted {
            Some(reply) => reply.into_result(),
            None if request.mode == OperationMode::Peek => Ok(BackendReply::Listing(Vec::new())),
            None => MockReply::artifact("mock-session").into_result(),
        }
    }

    fn download(&self, target: &DownloadTarget, sink: &mut dyn Write) -> Result<u64> {
        let artifacts = self.artifacts.lock().unwrap_or_else(PoisonError::into_inner);
        let data = artifacts
            .get(&target.session_id)
            .ok_or_else(|| Error::backend(404, None))?;
        sink.write_all(data)?;
        Ok(data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResizeOption;

    fn zip() -> FileHandle {
        FileHandle::from_bytes("a.zip", vec![0u8; 8])
    }

    fn names(fields: &[FormField]) -> Vec<&'static str> {
        fields.iter().map(|f| f.name).collect()
    }

    #[test]
    fn test_create_archive_fields() {
        let request = TransferRequest::new(
            OperationMode::CreateArchive,
            vec![
                FileHandle::from_bytes("a.txt", vec![1]),
                FileHandle::from_bytes("b.txt", vec![2]),
            ],
            TransferOptions::new()
                .password("pw")
                .resize(ResizeOption::Percent(50)),
        );
        let fields = request.form_fields();
        assert_eq!(
            names(&fields),
            ["files", "files", "password", "resizeOption", "stripMetadata"]
        );
    }

    #[test]
    fn test_create_archive_omits_blank_options() {
        let request = TransferRequest::new(
            OperationMode::CreateArchive,
            vec![zip()],
            TransferOptions::new().password(""),
        );
        assert_eq!(names(&request.form_fields()), ["files", "stripMetadata"]);
    }

    #[test]
    fn test_extract_selected_fields() {
        let request = TransferRequest::new(
            OperationMode::ExtractSelected,
            vec![zip()],
            TransferOptions::new().selected_paths(["a/b.txt", "c.txt"]),
        );
        let fields = request.form_fields();
        assert_eq!(names(&fields), ["file", "paths", "paths"]);
        match &fields[2].value {
            FieldValue::Text(t) => assert_eq!(t, "c.txt"),
            FieldValue::File(_) => panic!("expected text field"),
        }
    }

    #[test]
    fn test_image_fields() {
        let resize = TransferRequest::new(
            OperationMode::ResizeImages,
            vec![FileHandle::from_bytes("p.jpg", vec![1])],
            TransferOptions::new()
                .resize(ResizeOption::Custom {
                    width: 10,
                    height: 20,
                })
                .password("ignored"),
        );
        assert_eq!(
            names(&resize.form_fields()),
            ["files", "resizeOption", "stripMetadata"]
        );

        let strip = TransferRequest::new(
            OperationMode::StripMetadataOnly,
            vec![FileHandle::from_bytes("p.jpg", vec![1])],
            TransferOptions::new().strip_metadata(true),
        );
        assert_eq!(names(&strip.form_fields()), ["files"]);
    }

    #[test]
    fn test_download_route() {
        let target = DownloadTarget::new(Service::Image, "abc").path("x.png");
        assert_eq!(target.route(), "/api/image/download/abc");
        assert_eq!(target.path.as_deref(), Some("x.png"));
    }

    #[test]
    fn test_mock_records_and_defaults() {
        let mock = MockBackend::new();
        let request = TransferRequest::new(
            OperationMode::ExtractAll,
            vec![zip()],
            TransferOptions::new().password("pw"),
        );
        let reply = mock.submit(&request, &NoopObserver).unwrap();
        assert!(matches!(reply, BackendReply::Artifact(r) if r.session_id == "mock-session"));

        let submitted = mock.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].file_names, ["a.zip"]);
        assert_eq!(
            submitted[0].text_fields,
            [("password".to_string(), "pw".to_string())]
        );
    }

    #[test]
    fn test_mock_scripted_error() {
        let mock = MockBackend::new();
        mock.push_reply(
            OperationMode::Peek,
            MockReply::status(400, Some("bad password")),
        );
        let request = TransferRequest::new(OperationMode::Peek, vec![zip()], TransferOptions::new());
        let err = mock.submit(&request, &NoopObserver).unwrap_err();
        assert_eq!(err.user_message(OperationMode::Peek), "bad password");

        let again = mock.submit(&request, &NoopObserver).unwrap();
        assert_eq!(again, BackendReply::Listing(Vec::new()));
    }

    #[test]
    fn test_mock_download() {
        let mock = MockBackend::new();
        mock.add_artifact("s1", vec![1, 2, 3]);

        let mut out = Vec::new();
        let n = mock
            .download(&DownloadTarget::new(Service::Archive, "s1"), &mut out)
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(out, [1, 2, 3]);

        let missing = mock.download(&DownloadTarget::new(Service::Archive, "nope"), &mut out);
        assert!(missing.is_err());
    }

    #[test]
    fn test_mock_hold_and_release() {
        let mock = MockBackend::new();
        mock.hold();

        let worker = {
            let mock = mock.clone();
            std::thread::spawn(move || {
                let request =
                    TransferRequest::new(OperationMode::ExtractAll, vec![zip()], TransferOptions::new());
                mock.submit(&request, &NoopObserver)
            })
        };

        while mock.submitted().is_empty() {
            std::thread::yield_now();
        }
        assert!(!worker.is_finished());
        mock.release();
        assert!(worker.join().unwrap().is_ok());
    }
}
