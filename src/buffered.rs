//! Buffered socket reads.
//!
//! Every protocol reader in the crate sits on top of [`BufferedReader`]. A
//! single [`fill`](BufferedReader::fill) performs at most one bounded receive
//! from the underlying stream, and [`read_at_least`](BufferedReader::read_at_least)
//! repeats it until a byte count is buffered. Bytes a parser does not consume
//! stay buffered for the next call.

use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Default size of a single receive.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Accumulating reader over an async byte stream.
#[derive(Debug)]
pub struct BufferedReader<R> {
    inner: R,
    buf: BytesMut,
    chunk_size: usize,
}

impl<R: AsyncRead + Unpin> BufferedReader<R> {
    /// Wrap a stream, receiving at most `chunk_size` bytes per read.
    pub fn new(inner: R, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            inner,
            buf: BytesMut::with_capacity(chunk_size),
            chunk_size,
        }
    }

    /// Bytes received but not yet consumed.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Number of buffered bytes.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Receive size used by [`fill`](Self::fill).
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Perform one receive of up to `chunk_size` bytes.
    ///
    /// Returns the number of bytes appended; `0` means the peer closed its
    /// write side.
    pub async fn fill(&mut self) -> io::Result<usize> {
        self.buf.reserve(self.chunk_size);
        let mut limited = (&mut self.inner).take(self.chunk_size as u64);
        limited.read_buf(&mut self.buf).await
    }

    /// Receive until at least `n` bytes are buffered.
    ///
    /// Never requests more than one chunk per read, regardless of `n`.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] if the stream ends first.
    pub async fn read_at_least(&mut self, n: usize) -> io::Result<()> {
        while self.buf.len() < n {
            if self.fill().await? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("stream ended with {} of {n} bytes buffered", self.buf.len()),
                ));
            }
        }
        Ok(())
    }

    /// Remove and return the first `n` buffered bytes.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `n` bytes are buffered.
    pub fn consume(&mut self, n: usize) -> Bytes {
        self.buf.split_to(n).freeze()
    }

    /// Discard the first `n` buffered bytes.
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        let _ = self.buf.split_to(n);
    }
}
