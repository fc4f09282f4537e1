//! Application-level WebSocket messages.

use super::error::{WebSocketError, WebSocketResult};
use super::frame::{Frame, OpCode};
use bytes::Bytes;

/// A data message delivered to a socket view.
///
/// Frames are not reassembled: each data frame, including continuation
/// frames, becomes one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// UTF-8 text payload.
    Text(String),
    /// Binary or continuation payload.
    Binary(Bytes),
}

impl Message {
    /// Convert a data frame into a message.
    ///
    /// # Errors
    ///
    /// Fails on control or reserved frames and on text that is not UTF-8.
    pub fn from_frame(frame: Frame) -> WebSocketResult<Self> {
        match frame.opcode {
            OpCode::Text => String::from_utf8(frame.payload.to_vec())
                .map(Self::Text)
                .map_err(|_| WebSocketError::InvalidUtf8),
            OpCode::Binary | OpCode::Continuation => Ok(Self::Binary(frame.payload)),
            other => Err(WebSocketError::InvalidFrame(format!(
                "{other:?} frame does not carry a message"
            ))),
        }
    }

    /// Text content, if this is a text message.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
