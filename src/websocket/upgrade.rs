//! WebSocket HTTP upgrade handling.
//!
//! Implements the server side of the opening handshake per RFC 6455.

use super::error::{WebSocketError, WebSocketResult};
use crate::http::HttpHeaders;
use base64::Engine;
use bytes::Bytes;
use sha1::{Digest, Sha1};

/// WebSocket magic GUID for Sec-WebSocket-Accept calculation.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Whether a request head asks to switch to WebSocket.
#[must_use]
pub fn is_websocket_upgrade(head: &HttpHeaders) -> bool {
    head.header("upgrade")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"))
}

/// Check that a key is base64 for exactly 16 bytes.
#[must_use]
pub fn validate_key(key: &str) -> bool {
    base64::engine::general_purpose::STANDARD
        .decode(key.trim())
        .is_ok_and(|decoded| decoded.len() == 16)
}

/// Compute the Sec-WebSocket-Accept value for a client key.
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.trim().as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    base64::engine::general_purpose::STANDARD.encode(hash)
}

/// A negotiated handshake, ready to be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    accept: String,
}

impl Handshake {
    /// Validate an upgrade request and derive the accept key.
    ///
    /// With `strict_key` set, the key must decode to 16 bytes.
    pub fn negotiate(head: &HttpHeaders, strict_key: bool) -> WebSocketResult<Self> {
        if !is_websocket_upgrade(head) {
            return Err(WebSocketError::InvalidUpgrade(
                "Missing or invalid Upgrade header".to_string(),
            ));
        }

        let key = head
            .sec_websocket_key()
            .filter(|k| !k.trim().is_empty())
            .ok_or(WebSocketError::InvalidKey)?;

        if strict_key && !validate_key(key) {
            return Err(WebSocketError::InvalidKey);
        }

        Ok(Self {
            accept: compute_accept_key(key),
        })
    }

    /// The Sec-WebSocket-Accept value.
    #[must_use]
    pub fn accept_key(&self) -> &str {
        &self.accept
    }

    /// The `101 Switching Protocols` response.
    #[must_use]
    pub fn response(&self) -> Bytes {
        Bytes::from(format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\
             \r\n",
            self.accept
        ))
    }
}
