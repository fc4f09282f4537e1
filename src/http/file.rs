//! Streaming file responses.

use super::response::{serialize_head, HeaderList, Response};
use http::StatusCode;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// How the client should present a transferred file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Display in the browser.
    Inline,
    /// Offer as a download.
    Attachment,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

/// Guess a content type from a file extension.
#[must_use]
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js" | "mjs") => "text/javascript",
        Some("json") => "application/json",
        Some("txt" | "log") => "text/plain; charset=utf-8",
        Some("csv") => "text/csv",
        Some("xml") => "application/xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// A file sent as the response body, read from disk in fixed-size chunks.
///
/// The head (including `Content-Length`) is only built once the file has
/// been opened and its size is known.
#[derive(Debug, Clone)]
pub struct FileResponse {
    status: StatusCode,
    path: PathBuf,
    disposition: Disposition,
    filename: Option<String>,
    content_type: Option<String>,
    headers: HeaderList,
}

impl FileResponse {
    /// Offer `path` as a download.
    #[must_use]
    pub fn attachment(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Disposition::Attachment)
    }

    /// Serve `path` for display in the browser.
    #[must_use]
    pub fn inline(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Disposition::Inline)
    }

    fn new(path: impl Into<PathBuf>, disposition: Disposition) -> Self {
        Self {
            status: StatusCode::OK,
            path: path.into(),
            disposition,
            filename: None,
            content_type: None,
            headers: HeaderList::new(),
        }
    }

    /// Override the status code.
    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Override the file name announced to the client.
    #[must_use]
    pub fn filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    /// Override the guessed content type.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Set a header value.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// File to send.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Status the response is sent with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Disposition announced to the client.
    #[must_use]
    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    fn announced_name(&self) -> String {
        self.filename.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    /// Headers sent for a file of `len` bytes.
    #[must_use]
    pub fn head(&self, len: u64) -> String {
        let mut headers = self.headers.clone();
        let content_type = self
            .content_type
            .clone()
            .unwrap_or_else(|| content_type_for(&self.path).to_string());
        headers.set("Content-Type", content_type);
        let name = self.announced_name().replace(['"', '\\', '\r', '\n'], "_");
        headers.set(
            "Content-Disposition",
            format!("{}; filename=\"{name}\"", self.disposition.as_str()),
        );
        serialize_head(self.status, &headers, len)
    }

    /// Open the file, returning it with its length.
    pub async fn open(&self) -> io::Result<(File, u64)> {
        let file = File::open(&self.path).await?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a regular file", self.path.display()),
            ));
        }
        Ok((file, meta.len()))
    }

    /// Write the head and stream `file` in `chunk_size` reads.
    ///
    /// Returns the number of bytes written.
    pub async fn send<W: AsyncWrite + Unpin>(
        &self,
        mut file: File,
        len: u64,
        writer: &mut W,
        chunk_size: usize,
    ) -> io::Result<u64> {
        let head = self.head(len);
        writer.write_all(head.as_bytes()).await?;

        let mut written = head.len() as u64;
        let mut remaining = len;
        let mut chunk = vec![0u8; chunk_size.max(1)];
        while remaining > 0 {
            let want = chunk.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            let n = file.read(&mut chunk[..want]).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "file shrank while it was being sent",
                ));
            }
            writer.write_all(&chunk[..n]).await?;
            remaining -= n as u64;
            written += n as u64;
        }
        writer.flush().await?;
        Ok(written)
    }
}

/// What an HTTP view answers with.
#[derive(Debug, Clone)]
pub enum HttpReply {
    /// In-memory response.
    Response(Response),
    /// File streamed from disk.
    File(FileResponse),
}

impl HttpReply {
    /// Set a header on whichever response this is.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        match self {
            Self::Response(resp) => resp.set_header(name, value),
            Self::File(file) => file.set_header(name, value),
        }
    }

    /// Status the reply is sent with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Response(resp) => resp.status(),
            Self::File(file) => file.status_code(),
        }
    }
}

impl From<Response> for HttpReply {
    fn from(resp: Response) -> Self {
        Self::Response(resp)
    }
}

impl From<FileResponse> for HttpReply {
    fn from(file: FileResponse) -> Self {
        Self::File(file)
    }
}
