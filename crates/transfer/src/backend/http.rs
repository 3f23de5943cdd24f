//! HTTP backend for the processing service.
//!
//! This module provides [`HttpBackend`], which posts multipart requests to
//! the service's archive and image endpoints and streams artifacts back.
//!
//! Error statuses are not turned into transport errors by the agent: the
//! body of a 4xx/5xx reply carries the `{"error": "..."}` message shown to
//! the user, so every reply goes through [`parse_reply`].

use std::io::{self, Write};
use std::time::Duration;

use serde::Deserialize;
use ureq::SendBody;

use crate::backend::multipart::{MultipartBody, ProgressReader};
use crate::backend::{Backend, BackendReply, DownloadTarget, TransferRequest, UploadObserver};
use crate::error::{Error, Result};
use crate::types::{ArchiveEntry, OperationMode, TransferResult};

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default global timeout for one request, upload included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Upper bound for a JSON reply body.
const MAX_REPLY_SIZE: u64 = 16 * 1024 * 1024;

const USER_AGENT: &str = concat!("shrnk/", env!("CARGO_PKG_VERSION"));

/// HTTP backend for the processing service.
///
/// # Example
///
/// ```no_run
/// use transfer::backend::http::HttpBackend;
/// use transfer::backend::{Backend, NoopObserver, TransferRequest};
/// use transfer::{FileHandle, OperationMode, TransferOptions};
///
/// let backend = HttpBackend::with_base_url("http://localhost:8080");
/// let request = TransferRequest::new(
///     OperationMode::Peek,
///     vec![FileHandle::from_path("photos.zip").unwrap()],
///     TransferOptions::new(),
/// );
/// let reply = backend.submit(&request, &NoopObserver).unwrap();
/// println!("{reply:?}");
/// ```
pub struct HttpBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Service base URL, without a trailing slash.
    base_url: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Create a backend for the default local service.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a backend for the service at `base_url`.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::build(base_url.into(), DEFAULT_TIMEOUT)
    }

    /// Same backend with a different global request timeout.
    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        Self::build(self.base_url, timeout)
    }

    fn build(base_url: String, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the global request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URL of the endpoint for `mode`.
    #[must_use]
    pub fn endpoint_url(&self, mode: OperationMode) -> String {
        format!("{}{}", self.base_url, mode.endpoint())
    }

    /// Absolute URL of a download, without the query string.
    #[must_use]
    pub fn download_url(&self, target: &DownloadTarget) -> String {
        format!("{}{}", self.base_url, target.route())
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for HttpBackend {
    fn submit(
        &self,
        request: &TransferRequest,
        observer: &dyn UploadObserver,
    ) -> Result<BackendReply> {
        let url = self.endpoint_url(request.mode);
        let body = MultipartBody::new(request.form_fields());
        let content_type = body.content_type();
        let total = body.content_length();

        log::debug!("POST {url} ({total} bytes)");

        let mut reader = ProgressReader::new(body, total, observer);
        let mut response = self
            .agent
            .post(&url)
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", &content_type)
            .header("Content-Length", &total.to_string())
            .send(SendBody::from_reader(&mut reader))?;

        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .with_config()
            .limit(MAX_REPLY_SIZE)
            .read_to_string()
            .map_err(|e| Error::Transport(e.to_string()))?;

        log::debug!("{url} answered HTTP {status}");
        parse_reply(request.mode, status, &text)
    }

    fn download(&self, target: &DownloadTarget, sink: &mut dyn Write) -> Result<u64> {
        let url = self.download_url(target);
        log::debug!("GET {url}");

        let mut builder = self.agent.get(&url).header("User-Agent", USER_AGENT);
        if let Some(path) = &target.path {
            builder = builder.query("path", path);
        }
        let mut response = builder.call()?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let text = response.body_mut().read_to_string().unwrap_or_default();
            return Err(Error::backend(status, error_message(&text)));
        }

        let mut reader = response.body_mut().as_reader();
        let written = io::copy(&mut reader, sink).map_err(|e| Error::Transport(e.to_string()))?;
        Ok(written)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Message of a structured `{"error": "..."}` body, if there is one.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty())
}

/// Interpret a reply to a request of `mode`.
///
/// A 2xx body is parsed as an archive listing for peeks and as a
/// [`TransferResult`] otherwise; a body that does not parse is an
/// [`Error::InvalidResponse`]. Any other status is an [`Error::Backend`]
/// carrying the `{error}` message when the body has one.
pub fn parse_reply(mode: OperationMode, status: u16, body: &str) -> Result<BackendReply> {
    if !(200..300).contains(&status) {
        return Err(Error::backend(status, error_message(body)));
    }

    if mode == OperationMode::Peek {
        let entries: Vec<ArchiveEntry> = serde_json::from_str(body)?;
        Ok(BackendReply::Listing(entries))
    } else {
        let result: TransferResult = serde_json::from_str(body)?;
        Ok(BackendReply::Artifact(result))
    }
}
