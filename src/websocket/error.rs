//! WebSocket error types.

use std::io;
use thiserror::Error;

/// Errors raised by the handshake, the frame codec and client handles.
#[derive(Debug, Error)]
pub enum WebSocketError {
    /// Socket read or write failed.
    #[error("socket error: {0}")]
    Io(#[source] io::Error),

    /// The request cannot be upgraded.
    #[error("not an acceptable upgrade request: {0}")]
    InvalidUpgrade(String),

    /// `Sec-WebSocket-Key` is missing or does not decode to 16 bytes.
    #[error("missing or malformed Sec-WebSocket-Key")]
    InvalidKey,

    /// The peer broke RFC 6455 framing rules.
    #[error("protocol violation: {0}")]
    InvalidFrame(String),

    /// Declared payload length is over the configured limit.
    #[error("payload of {actual} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Configured limit.
        max: usize,
        /// Length announced in the frame header.
        actual: u64,
    },

    /// The stream ended, possibly in the middle of a frame.
    #[error("peer closed the connection")]
    ConnectionClosed,

    /// A text message carried invalid UTF-8.
    #[error("text message is not valid UTF-8")]
    InvalidUtf8,

    /// The addressed client has disconnected.
    #[error("client is no longer connected")]
    NotConnected,
}

/// Result type for WebSocket operations.
pub type WebSocketResult<T> = Result<T, WebSocketError>;

impl From<io::Error> for WebSocketError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => Self::ConnectionClosed,
            _ => Self::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_too_large_names_both_sizes() {
        let err = WebSocketError::FrameTooLarge {
            max: 1024,
            actual: 2048,
        };
        assert_eq!(
            err.to_string(),
            "payload of 2048 bytes exceeds the 1024 byte limit"
        );
    }

    #[test]
    fn test_io_kept_as_source() {
        let err = WebSocketError::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(matches!(err, WebSocketError::Io(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_eof_is_closed() {
        let err = WebSocketError::from(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, WebSocketError::ConnectionClosed));
        assert!(err.source().is_none());
    }
}
