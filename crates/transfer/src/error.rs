//! Error types for transfer operations.
//!
//! Errors are categorized so the view layer can decide how to present them.
//! Local validation errors never reach the backend; everything else ends an
//! operation in the `Failed` phase.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::types::OperationMode;

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown when the transport fails or the reply cannot be understood.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error";

/// Categories of transfer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected locally before any request was made.
    Validation,
    /// Connectivity failure between client and backend.
    Transport,
    /// The backend answered with an error status.
    Backend,
    /// The backend answered with a body that could not be parsed.
    Format,
    /// Local file access failed.
    Io,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether starting the same operation again may succeed without changes.
    ///
    /// Only a hint for the user; nothing in this crate retries on its own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Nothing to submit",
            Self::Transport => "Network connectivity issue",
            Self::Backend => "The processing service rejected the request",
            Self::Format => "Unexpected response from the processing service",
            Self::Io => "Local file error",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Select input files (and archive entries for selective extraction)",
            Self::Transport => "Check that the service is reachable and try again",
            Self::Backend => "Check the password and options, then start the operation again",
            Self::Format => "Verify the configured base URL points at the processing service",
            Self::Io => "Check that the input files exist and are readable",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during transfer operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No input files were supplied.
    #[error("no files selected for {0}")]
    NoFiles(OperationMode),

    /// Selective extraction was requested without selected entries.
    #[error("no archive entries selected")]
    NoSelection,

    /// Image resizing was requested without a resize option.
    #[error("no resize option given")]
    MissingResize,

    /// A selection named a path that is not a file of the listed archive.
    #[error("'{0}' is not a file in the archive")]
    UnknownEntry(String),

    /// A resize option string could not be parsed.
    #[error("invalid resize option '{0}' (expected 50, 25 or <width>x<height>)")]
    InvalidResizeOption(String),

    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Message from the structured `{error}` body, if any.
        message: Option<String>,
    },

    /// The request could not be delivered or the reply not received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend reported success but the body was not understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// IO error during file operations.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a backend error.
    pub fn backend(status: u16, message: Option<String>) -> Self {
        Self::Backend { status, message }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NoFiles(_) | Error::NoSelection | Error::MissingResize => {
                ErrorCategory::Validation
            }
            Error::InvalidResizeOption(_) | Error::UnknownEntry(_) => ErrorCategory::Validation,
            Error::Backend { .. } => ErrorCategory::Backend,
            Error::Transport(_) => ErrorCategory::Transport,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Io { .. } => ErrorCategory::Io,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error was raised before anything was sent.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    /// The message a failed operation of `mode` displays for this error.
    ///
    /// Backend messages are passed through verbatim. A backend error without
    /// a readable body falls back to the mode's generic failure text, and
    /// transport or malformed replies collapse to [`NETWORK_ERROR_MESSAGE`].
    #[must_use]
    pub fn user_message(&self, mode: OperationMode) -> String {
        match self {
            Error::Backend {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            Error::Backend { .. } => mode.failure_message().to_string(),
            Error::Transport(_) | Error::InvalidResponse(_) => NETWORK_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Backend {
                status: code,
                message: None,
            },
            ureq::Error::Io(e) => Self::from_body_io(e),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl Error {
    /// Recover a local error that travelled through the request body reader.
    ///
    /// The multipart body wraps file errors in `io::Error::other`; anything
    /// else is a transport failure.
    fn from_body_io(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<Self>()) {
            return Self::Transport(err.to_string());
        }
        match err.into_inner().map(|inner| inner.downcast::<Self>()) {
            Some(Ok(local)) => *local,
            Some(Err(other)) => Self::Transport(other.to_string()),
            None => Self::Transport("I/O error".to_string()),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
