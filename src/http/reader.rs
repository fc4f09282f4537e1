//! Reads HTTP/1.1 request heads and bodies off a connection.

use super::error::{HttpError, HttpResult};
use super::request::HttpHeaders;
use crate::buffered::BufferedReader;
use bytes::{Bytes, BytesMut};
use tokio::io::AsyncRead;
use tracing::trace;

/// Longest chunk-size line accepted, extensions included.
const MAX_CHUNK_LINE: usize = 1024;

/// Reader enforcing header and body size limits.
#[derive(Debug, Clone, Copy)]
pub struct HttpMessageReader {
    max_header_size: usize,
    max_body_size: usize,
}

impl HttpMessageReader {
    /// Create a reader with the given limits.
    #[must_use]
    pub fn new(max_header_size: usize, max_body_size: usize) -> Self {
        Self {
            max_header_size,
            max_body_size,
        }
    }

    /// Accumulate input until a full header block is buffered and parse it.
    ///
    /// The head is consumed from `reader`; any body bytes stay buffered.
    pub async fn read_head<R: AsyncRead + Unpin>(
        &self,
        reader: &mut BufferedReader<R>,
    ) -> HttpResult<HttpHeaders> {
        loop {
            if let Some((head, len)) = HttpHeaders::parse(reader.buffer())? {
                if len > self.max_header_size {
                    return Err(HttpError::HeaderTooLarge {
                        size: len,
                        max: self.max_header_size,
                    });
                }
                reader.advance(len);
                trace!(method = %head.method(), target = head.target(), "Request head parsed");
                return Ok(head);
            }

            if reader.buffered() > self.max_header_size {
                return Err(HttpError::HeaderTooLarge {
                    size: reader.buffered(),
                    max: self.max_header_size,
                });
            }

            if reader.fill().await? == 0 {
                return Err(HttpError::ConnectionClosed);
            }
        }
    }

    /// Read the body announced by `head`.
    ///
    /// Handles `Content-Length` and chunked transfer encoding. A head with
    /// neither has an empty body.
    pub async fn read_body<R: AsyncRead + Unpin>(
        &self,
        reader: &mut BufferedReader<R>,
        head: &HttpHeaders,
    ) -> HttpResult<Bytes> {
        if head.is_chunked() {
            return self.read_chunked(reader).await;
        }

        let len = match head.content_length()? {
            None | Some(0) => return Ok(Bytes::new()),
            Some(len) => len,
        };

        if len > self.max_body_size as u64 {
            return Err(HttpError::BodyTooLarge {
                size: len,
                max: self.max_body_size,
            });
        }

        // Bounded by max_body_size above.
        let len = len as usize;
        reader
            .read_at_least(len)
            .await
            .map_err(HttpError::from_read)?;
        Ok(reader.consume(len))
    }

    async fn read_chunked<R: AsyncRead + Unpin>(
        &self,
        reader: &mut BufferedReader<R>,
    ) -> HttpResult<Bytes> {
        let mut body = BytesMut::new();

        loop {
            let (line_len, size) = loop {
                match httparse::parse_chunk_size(reader.buffer()) {
                    Ok(httparse::Status::Complete(parsed)) => break parsed,
                    Ok(httparse::Status::Partial) => {
                        if reader.buffered() > MAX_CHUNK_LINE {
                            return Err(HttpError::InvalidChunk(
                                "chunk size line too long".to_string(),
                            ));
                        }
                        fill(reader).await?;
                    },
                    Err(_) => {
                        return Err(HttpError::InvalidChunk(
                            "invalid chunk size line".to_string(),
                        ))
                    },
                }
            };
            reader.advance(line_len);

            let total = (body.len() as u64).saturating_add(size);
            if total > self.max_body_size as u64 {
                return Err(HttpError::BodyTooLarge {
                    size: total,
                    max: self.max_body_size,
                });
            }

            if size == 0 {
                self.skip_trailers(reader).await?;
                return Ok(body.freeze());
            }

            // Bounded by max_body_size above.
            let size = size as usize;
            reader
                .read_at_least(size + 2)
                .await
                .map_err(HttpError::from_read)?;
            if &reader.buffer()[size..size + 2] != b"\r\n" {
                return Err(HttpError::InvalidChunk(
                    "chunk data not followed by CRLF".to_string(),
                ));
            }
            body.extend_from_slice(&reader.buffer()[..size]);
            reader.advance(size + 2);
        }
    }

    async fn skip_trailers<R: AsyncRead + Unpin>(
        &self,
        reader: &mut BufferedReader<R>,
    ) -> HttpResult<()> {
        let mut skipped = 0usize;
        loop {
            match find_crlf(reader.buffer()) {
                Some(0) => {
                    reader.advance(2);
                    return Ok(());
                },
                Some(at) => {
                    skipped += at + 2;
                    reader.advance(at + 2);
                },
                None => fill(reader).await?,
            }
            if skipped > self.max_header_size {
                return Err(HttpError::HeaderTooLarge {
                    size: skipped,
                    max: self.max_header_size,
                });
            }
        }
    }
}

async fn fill<R: AsyncRead + Unpin>(reader: &mut BufferedReader<R>) -> HttpResult<()> {
    if reader.fill().await? == 0 {
        return Err(HttpError::ConnectionClosed);
    }
    Ok(())
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffered::tests::ChunkedSource;

    fn reader_over(data: &[u8], piece: usize) -> BufferedReader<ChunkedSource> {
        BufferedReader::new(ChunkedSource::split(data, piece), 1024)
    }

    fn http_reader() -> HttpMessageReader {
        HttpMessageReader::new(8192, 1024)
    }

    #[tokio::test]
    async fn test_read_head_across_pieces() {
        let data = b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let mut reader = reader_over(data, 5);

        let head = http_reader().read_head(&mut reader).await.unwrap();
        assert_eq!(head.path(), "/hello");
        assert_eq!(reader.buffered(), 0);
    }

    #[tokio::test]
    async fn test_read_head_eof() {
        let mut reader = reader_over(b"GET / HTTP/1.1\r\n", 64);
        let err = http_reader().read_head(&mut reader).await.unwrap_err();
        assert!(matches!(err, HttpError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_read_head_too_large() {
        let mut data = b"GET / HTTP/1.1\r\n".to_vec();
        for i in 0..50 {
            data.extend_from_slice(format!("X-Filler-{i}: {}\r\n", "v".repeat(40)).as_bytes());
        }
        data.extend_from_slice(b"\r\n");
        let mut reader = reader_over(&data, 256);

        let err = HttpMessageReader::new(512, 1024)
            .read_head(&mut reader)
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::HeaderTooLarge { max: 512, .. }));
    }

    #[tokio::test]
    async fn test_read_content_length_body() {
        let data = b"POST /submit HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello world";
        let mut reader = reader_over(data, 4);
        let http = http_reader();

        let head = http.read_head(&mut reader).await.unwrap();
        let body = http.read_body(&mut reader, &head).await.unwrap();
        assert_eq!(body.as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn test_read_body_absent() {
        let mut reader = reader_over(b"GET / HTTP/1.1\r\n\r\n", 64);
        let http = http_reader();

        let head = http.read_head(&mut reader).await.unwrap();
        assert!(http.read_body(&mut reader, &head).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_body_too_large() {
        let data = b"POST / HTTP/1.1\r\nContent-Length: 5000\r\n\r\n";
        let mut reader = reader_over(data, 64);
        let http = http_reader();

        let head = http.read_head(&mut reader).await.unwrap();
        let err = http.read_body(&mut reader, &head).await.unwrap_err();
        assert!(matches!(err, HttpError::BodyTooLarge { size: 5000, .. }));
    }

    #[tokio::test]
    async fn test_read_body_truncated() {
        let data = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";
        let mut reader = reader_over(data, 64);
        let http = http_reader();

        let head = http.read_head(&mut reader).await.unwrap();
        let err = http.read_body(&mut reader, &head).await.unwrap_err();
        assert!(matches!(err, HttpError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_read_chunked_body() {
        let data = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
                     5\r\nhello\r\n6;ext=1\r\n world\r\n0\r\nX-Trailer: yes\r\n\r\n";
        let mut reader = reader_over(data, 3);
        let http = http_reader();

        let head = http.read_head(&mut reader).await.unwrap();
        let body = http.read_body(&mut reader, &head).await.unwrap();
        assert_eq!(body.as_ref(), b"hello world");
        assert_eq!(reader.buffered(), 0);
    }

    #[tokio::test]
    async fn test_read_chunked_bad_size() {
        let data = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n";
        let mut reader = reader_over(data, 64);
        let http = http_reader();

        let head = http.read_head(&mut reader).await.unwrap();
        let err = http.read_body(&mut reader, &head).await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidChunk(_)));
    }

    #[tokio::test]
    async fn test_read_chunked_too_large() {
        let data = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nFFFF\r\n";
        let mut reader = reader_over(data, 64);
        let http = http_reader();

        let head = http.read_head(&mut reader).await.unwrap();
        let err = http.read_body(&mut reader, &head).await.unwrap_err();
        assert!(matches!(err, HttpError::BodyTooLarge { .. }));
    }
}
