//! Core types for transfer operations.
//!
//! This module holds the data model shared by the orchestrator, the backends
//! and the view layer: operation modes, file handles, request options, the
//! live [`TransferState`] and the results returned by the processing service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};

/// One user-initiated request/response cycle against the backend.
///
/// # Example
///
/// ```
/// use transfer::OperationMode;
///
/// let mode = OperationMode::ExtractSelected;
/// assert_eq!(mode.endpoint(), "/api/archive/extract-selected");
/// assert!(mode.single_file());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationMode {
    /// Compress files into a (possibly encrypted) ZIP archive.
    CreateArchive,
    /// Extract every member of an archive.
    ExtractAll,
    /// List the members of an archive without extracting.
    Peek,
    /// Extract a chosen subset of archive members.
    ExtractSelected,
    /// Resize a batch of images.
    ResizeImages,
    /// Remove EXIF metadata from a batch of images.
    StripMetadataOnly,
}

impl OperationMode {
    /// Get the mode identifier.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateArchive => "create-archive",
            Self::ExtractAll => "extract-all",
            Self::Peek => "peek",
            Self::ExtractSelected => "extract-selected",
            Self::ResizeImages => "resize-images",
            Self::StripMetadataOnly => "strip-metadata",
        }
    }

    /// Which backend service handles this mode.
    #[must_use]
    pub fn service(&self) -> Service {
        match self {
            Self::CreateArchive | Self::ExtractAll | Self::Peek | Self::ExtractSelected => {
                Service::Archive
            }
            Self::ResizeImages | Self::StripMetadataOnly => Service::Image,
        }
    }

    /// Path of the backend endpoint, relative to the base URL.
    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::CreateArchive => "/api/archive/zip",
            Self::ExtractAll => "/api/archive/unzip",
            Self::Peek => "/api/archive/peek",
            Self::ExtractSelected => "/api/archive/extract-selected",
            Self::ResizeImages => "/api/image/resize",
            Self::StripMetadataOnly => "/api/image/strip-metadata",
        }
    }

    /// Whether the mode takes exactly one input file (an archive).
    #[must_use]
    pub fn single_file(&self) -> bool {
        matches!(self, Self::ExtractAll | Self::Peek | Self::ExtractSelected)
    }

    /// Whether the mode shows the upload/synthetic-processing split.
    ///
    /// Peek and metadata stripping are quick, so they only report
    /// request/response.
    #[must_use]
    pub fn shows_synthetic_phase(&self) -> bool {
        !matches!(self, Self::Peek | Self::StripMetadataOnly)
    }

    /// Status label shown while the backend works.
    #[must_use]
    pub fn processing_label(&self) -> &'static str {
        match self {
            Self::CreateArchive => "Compressing",
            Self::ExtractAll | Self::ExtractSelected => "Extracting",
            Self::Peek => "Reading archive",
            Self::ResizeImages => "Resizing",
            Self::StripMetadataOnly => "Stripping metadata",
        }
    }

    /// Percent points added per synthetic tick.
    #[must_use]
    pub fn synthetic_increment(&self) -> f64 {
        match self {
            Self::CreateArchive => 2.0,
            _ => 3.0,
        }
    }

    /// Generic failure text used when the backend gives no reason.
    #[must_use]
    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::CreateArchive | Self::ResizeImages => "Processing failed",
            Self::ExtractAll => "Extraction failed",
            Self::Peek => "Failed to peek into archive",
            Self::ExtractSelected => "Selective extraction failed",
            Self::StripMetadataOnly => "Metadata stripping failed",
        }
    }

    /// Whether a successful run leaves a downloadable artifact.
    #[must_use]
    pub fn produces_artifact(&self) -> bool {
        !matches!(self, Self::Peek)
    }

    /// Get all operation modes.
    #[must_use]
    pub fn all() -> &'static [OperationMode] {
        &[
            OperationMode::CreateArchive,
            OperationMode::ExtractAll,
            OperationMode::Peek,
            OperationMode::ExtractSelected,
            OperationMode::ResizeImages,
            OperationMode::StripMetadataOnly,
        ]
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Backend service family, used to build download URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// `/api/archive/...`
    Archive,
    /// `/api/image/...`
    Image,
}

impl Service {
    /// Path segment under `/api`.
    #[must_use]
    pub fn segment(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segment())
    }
}

#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// A locally selected input file.
///
/// Cloning is cheap; in-memory contents are shared.
#[derive(Debug, Clone)]
pub struct FileHandle {
    name: String,
    size_bytes: u64,
    source: FileSource,
}

impl FileHandle {
    /// Reference a file on disk. The size is read from its metadata.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = path.metadata().map_err(|e| Error::io(path, e))?;
        if !metadata.is_file() {
            return Err(Error::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            size_bytes: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Wrap bytes already held in memory.
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// File name sent to the backend.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Path on disk, if the file is not held in memory.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            FileSource::Path(p) => Some(p),
            FileSource::Memory(_) => None,
        }
    }

    /// Open a fresh byte stream over the file contents.
    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        match &self.source {
            FileSource::Path(p) => {
                let file = File::open(p).map_err(|e| Error::io(p, e))?;
                Ok(Box::new(file))
            }
            FileSource::Memory(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
        }
    }
}

/// How images are scaled before processing.
///
/// # Example
///
/// ```
/// use transfer::ResizeOption;
///
/// let custom: ResizeOption = "800x600".parse().unwrap();
/// assert_eq!(custom, ResizeOption::Custom { width: 800, height: 600 });
/// assert_eq!(custom.form_value(), "800x600");
/// assert!("".parse::<ResizeOption>().unwrap().is_original());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeOption {
    /// Keep original dimensions.
    #[default]
    Original,
    /// Scale to a percentage of the original (50 or 25).
    Percent(u8),
    /// Scale to explicit dimensions.
    Custom {
        /// Target width in pixels.
        width: u32,
        /// Target height in pixels.
        height: u32,
    },
}

impl ResizeOption {
    /// Whether no resizing was requested.
    #[must_use]
    pub fn is_original(&self) -> bool {
        matches!(self, Self::Original)
    }

    /// Value of the `resizeOption` form field.
    #[must_use]
    pub fn form_value(&self) -> String {
        match self {
            Self::Original => String::new(),
            Self::Percent(p) => p.to_string(),
            Self::Custom { width, height } => format!("{width}x{height}"),
        }
    }
}

impl FromStr for ResizeOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "" | "none" => Ok(Self::Original),
            "50" | "50%" => Ok(Self::Percent(50)),
            "25" | "25%" => Ok(Self::Percent(25)),
            _ => {
                let (w, h) = s
                    .split_once(['x', 'X'])
                    .ok_or_else(|| Error::InvalidResizeOption(s.to_string()))?;
                let width: u32 = w
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidResizeOption(s.to_string()))?;
                let height: u32 = h
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidResizeOption(s.to_string()))?;
                if width == 0 || height == 0 {
                    return Err(Error::InvalidResizeOption(s.to_string()));
                }
                Ok(Self::Custom { width, height })
            }
        }
    }
}

impl fmt::Display for ResizeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => write!(f, "original size"),
            Self::Percent(p) => write!(f, "{p}%"),
            Self::Custom { width, height } => write!(f, "{width}x{height}"),
        }
    }
}

/// Options for a transfer.
///
/// Use the builder pattern; fields a mode does not use are ignored.
///
/// # Example
///
/// ```
/// use transfer::{ResizeOption, TransferOptions};
///
/// let options = TransferOptions::new()
///     .password("secret")
///     .resize(ResizeOption::Percent(50))
///     .strip_metadata(true);
///
/// assert_eq!(options.password.as_deref(), Some("secret"));
/// assert!(options.strip_metadata);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Archive password (None or empty = no encryption).
    pub password: Option<String>,
    /// Image resize option.
    pub resize: ResizeOption,
    /// Whether to strip EXIF metadata while processing.
    pub strip_metadata: bool,
    /// Archive members to extract (ExtractSelected only).
    pub selected_paths: Vec<String>,
}

impl TransferOptions {
    /// Create new options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the archive password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the resize option.
    #[must_use]
    pub fn resize(mut self, resize: ResizeOption) -> Self {
        self.resize = resize;
        self
    }

    /// Set whether metadata is stripped.
    #[must_use]
    pub fn strip_metadata(mut self, strip: bool) -> Self {
        self.strip_metadata = strip;
        self
    }

    /// Set the archive members to extract.
    #[must_use]
    pub fn selected_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Password, if one was given and is not blank.
    #[must_use]
    pub fn effective_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

/// One file produced by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    /// File name.
    pub name: String,
    /// Size in bytes.
    #[serde(rename = "size", default)]
    pub size_bytes: u64,
}

/// Result of a completed artifact-producing operation.
///
/// The backend omits fields depending on the endpoint, so everything except
/// the session id is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    /// Handle used to download the artifact.
    pub session_id: String,
    /// Name of the produced artifact.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Number of files produced.
    #[serde(default)]
    pub total_files: Option<u64>,
    /// Size of the artifact in bytes.
    #[serde(rename = "size", default)]
    pub size_bytes: Option<u64>,
    /// Produced files, in backend order.
    #[serde(rename = "files", default)]
    pub output_files: Vec<OutputFile>,
}

/// One member of an archive, as listed by a peek.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Slash-separated member path.
    pub path: String,
    /// Uncompressed size in bytes.
    #[serde(rename = "size", default)]
    pub size_bytes: u64,
    /// Whether the member is a directory.
    #[serde(rename = "directory", default)]
    pub is_directory: bool,
}

impl ArchiveEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(path: impl Into<String>, size_bytes: u64, is_directory: bool) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            is_directory,
        }
    }
}

/// Lifecycle phase of the live transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Request body is being sent.
    Uploading,
    /// Waiting for the backend to finish.
    Processing,
    /// Backend replied with success.
    Complete,
    /// Backend or transport failed.
    Failed,
}

impl Phase {
    /// Whether an operation is in flight.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Uploading | Self::Processing)
    }

    /// Whether the operation has finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Snapshot of the live operation, rendered by the view layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferState {
    /// Mode of the operation this state belongs to (None when idle).
    pub mode: Option<OperationMode>,
    /// Lifecycle phase.
    pub phase: Phase,
    /// Overall progress, 0 to 100.
    pub percent: f64,
    /// Short status, e.g. "Uploading" or "Compressing".
    pub status_label: String,
    /// Byte counter while uploading, e.g. "1.5 MB / 10.0 MB".
    pub detail_label: Option<String>,
    /// Estimated time left for the upload.
    pub eta_label: Option<String>,
    /// Why the operation failed.
    pub error_message: Option<String>,
    /// Result of an artifact-producing operation.
    pub result: Option<TransferResult>,
    /// Members listed by a peek.
    pub entries: Option<Vec<ArchiveEntry>>,
}

impl TransferState {
    /// A fresh idle state.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }
}
