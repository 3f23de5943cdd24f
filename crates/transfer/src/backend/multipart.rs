//! Streaming `multipart/form-data` encoding.
//!
//! Files are never buffered whole: [`MultipartBody`] opens each file when the
//! reader reaches it and streams it between the part headers. The exact body
//! length is known up front, so the request can carry a `Content-Length`.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::backend::{FieldValue, FormField, UploadObserver};
use crate::types::FileHandle;

enum Segment {
    Bytes(Vec<u8>),
    File(FileHandle),
}

impl Segment {
    fn len(&self) -> u64 {
        match self {
            Self::Bytes(b) => b.len() as u64,
            Self::File(f) => f.size_bytes(),
        }
    }
}

/// A `multipart/form-data` request body that implements [`Read`].
pub struct MultipartBody {
    boundary: String,
    segments: VecDeque<Segment>,
    current: Option<Box<dyn Read + Send>>,
    content_length: u64,
}

impl MultipartBody {
    /// Encode `fields` with a generated boundary.
    #[must_use]
    pub fn new(fields: Vec<FormField>) -> Self {
        Self::with_boundary(fields, generate_boundary())
    }

    /// Encode `fields` with a fixed boundary.
    #[must_use]
    pub fn with_boundary(fields: Vec<FormField>, boundary: impl Into<String>) -> Self {
        let boundary = boundary.into();
        let mut segments = VecDeque::new();

        for field in fields {
            match field.value {
                FieldValue::Text(value) => {
                    let mut part = format!(
                        "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
                        field.name
                    )
                    .into_bytes();
                    part.extend_from_slice(value.as_bytes());
                    part.extend_from_slice(b"\r\n");
                    segments.push_back(Segment::Bytes(part));
                }
                FieldValue::File(file) => {
                    let header = format!(
                        "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        field.name,
                        escape_filename(file.name())
                    );
                    segments.push_back(Segment::Bytes(header.into_bytes()));
                    segments.push_back(Segment::File(file));
                    segments.push_back(Segment::Bytes(b"\r\n".to_vec()));
                }
            }
        }
        segments.push_back(Segment::Bytes(format!("--{boundary}--\r\n").into_bytes()));

        let content_length = segments.iter().map(Segment::len).sum();
        Self {
            boundary,
            segments,
            current: None,
            content_length,
        }
    }

    /// Value of the `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Exact number of bytes the body will produce.
    #[must_use]
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    fn next_reader(&mut self) -> io::Result<Option<Box<dyn Read + Send>>> {
        match self.segments.pop_front() {
            None => Ok(None),
            Some(Segment::Bytes(b)) => Ok(Some(Box::new(Cursor::new(b)))),
            Some(Segment::File(f)) => {
                let reader = f.open().map_err(io::Error::other)?;
                // Never send more than the announced length.
                Ok(Some(Box::new(reader.take(f.size_bytes()))))
            }
        }
    }
}

impl Read for MultipartBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if let Some(reader) = self.current.as_mut() {
                let n = reader.read(buf)?;
                if n > 0 {
                    return Ok(n);
                }
                self.current = None;
            }
            match self.next_reader()? {
                Some(reader) => self.current = Some(reader),
                None => return Ok(0),
            }
        }
    }
}

/// Reports bytes read through it to an [`UploadObserver`].
///
/// `on_flushed` fires once: as soon as `total` bytes have been read, or the
/// first time the inner reader is exhausted, whichever comes first. Clients
/// that send a `Content-Length` stop reading at `total` and never make the
/// final empty read.
pub struct ProgressReader<'a, R> {
    inner: R,
    observer: &'a dyn UploadObserver,
    sent: u64,
    total: u64,
    flushed: bool,
}

impl<'a, R: Read> ProgressReader<'a, R> {
    /// Wrap `inner`, which yields `total` bytes.
    pub fn new(inner: R, total: u64, observer: &'a dyn UploadObserver) -> Self {
        Self {
            inner,
            observer,
            sent: 0,
            total,
            flushed: false,
        }
    }
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.sent += n as u64;
            self.observer.on_progress(self.sent, self.total);
            if self.sent >= self.total {
                self.flush_once();
            }
        } else if !buf.is_empty() {
            self.flush_once();
        }
        Ok(n)
    }
}

impl<R> ProgressReader<'_, R> {
    fn flush_once(&mut self) {
        if !self.flushed {
            self.flushed = true;
            self.observer.on_flushed();
        }
    }
}

fn escape_filename(name: &str) -> String {
    name.replace('"', "%22").replace(['\r', '\n'], "")
}

fn generate_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("shrnk-{:x}{:x}", nanos, std::process::id())
}
