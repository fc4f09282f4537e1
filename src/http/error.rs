//! Error types for HTTP message handling.

use http::StatusCode;
use std::io;
use thiserror::Error;

/// Errors that can occur while reading or writing HTTP messages.
#[derive(Debug, Error)]
pub enum HttpError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// HTTP parsing error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid HTTP method.
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// Header block too large.
    #[error("Header too large: {size} bytes (max: {max})")]
    HeaderTooLarge {
        /// Bytes buffered so far.
        size: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Body too large.
    #[error("Body too large: {size} bytes (max: {max})")]
    BodyTooLarge {
        /// Declared or accumulated size.
        size: u64,
        /// Maximum allowed.
        max: usize,
    },

    /// Content-Length header is not a number.
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    /// Malformed chunked transfer encoding.
    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    /// Timeout error.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Connection closed before the message was complete.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type for HTTP operations.
pub type HttpResult<T> = Result<T, HttpError>;

impl HttpError {
    /// Status code to answer with when this error ends a request.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Parse(_)
            | Self::InvalidMethod(_)
            | Self::InvalidContentLength(_)
            | Self::InvalidChunk(_) => StatusCode::BAD_REQUEST,
            Self::HeaderTooLarge { .. } => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::Io(_) | Self::ConnectionClosed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the peer is still worth answering.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    pub(crate) fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::ConnectionClosed
        } else {
            Self::Io(err)
        }
    }
}

impl From<httparse::Error> for HttpError {
    fn from(err: httparse::Error) -> Self {
        HttpError::Parse(err.to_string())
    }
}

impl From<http::method::InvalidMethod> for HttpError {
    fn from(err: http::method::InvalidMethod) -> Self {
        HttpError::InvalidMethod(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HttpError::HeaderTooLarge {
            size: 9000,
            max: 8192,
        };
        assert_eq!(err.to_string(), "Header too large: 9000 bytes (max: 8192)");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let http_err = HttpError::from(io_err);
        assert!(matches!(http_err, HttpError::Io(_)));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            HttpError::Parse("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HttpError::BodyTooLarge { size: 10, max: 1 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            HttpError::HeaderTooLarge { size: 10, max: 1 }.status_code(),
            StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
        );
        assert!(!HttpError::ConnectionClosed.is_client_error());
    }

    #[test]
    fn test_eof_read_is_closed() {
        let err = HttpError::from_read(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, HttpError::ConnectionClosed));
    }
}
