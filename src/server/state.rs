//! Per-connection lifecycle.

use super::error::{ServerError, ServerResult};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global connection ID counter.
static CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, nothing read yet.
    Accepted,
    /// Reading the request head.
    Classifying,
    /// Serving a single HTTP request.
    HttpActive,
    /// Negotiating a WebSocket upgrade.
    WsHandshaking,
    /// HTTP response written.
    HttpDone,
    /// WebSocket session running.
    WsOpen,
    /// Socket closed.
    Closed,
}

impl ConnectionState {
    /// Whether `next` may follow this state.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Accepted, Classifying)
            | (Classifying, HttpActive)
            | (Classifying, WsHandshaking)
            | (HttpActive, HttpDone)
            | (WsHandshaking, WsOpen)
            | (WsOpen, WsOpen) => true,
            _ => false,
        }
    }

    /// Whether the connection is finished.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }
}

/// Protocol a connection was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Not decided yet.
    Unclassified,
    /// Plain HTTP/1.1.
    Http,
    /// WebSocket upgrade.
    WebSocket,
}

/// Bookkeeping for one accepted connection.
#[derive(Debug)]
pub struct Connection {
    id: u64,
    peer_addr: SocketAddr,
    protocol: Protocol,
    state: ConnectionState,
}

impl Connection {
    /// Track a freshly accepted connection.
    #[must_use]
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self {
            id: CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            peer_addr,
            protocol: Protocol::Unclassified,
            state: ConnectionState::Accepted,
        }
    }

    /// Connection ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Peer address.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Protocol tag.
    #[must_use]
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Fails if `next` may not follow the current state.
    pub fn transition(&mut self, next: ConnectionState) -> ServerResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(ServerError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Set the protocol tag. Allowed exactly once.
    ///
    /// # Errors
    ///
    /// Fails if the connection was already classified.
    pub fn classify(&mut self, protocol: Protocol) -> ServerResult<()> {
        if self.protocol != Protocol::Unclassified || protocol == Protocol::Unclassified {
            return Err(ServerError::AlreadyClassified {
                current: self.protocol,
            });
        }
        self.protocol = protocol;
        Ok(())
    }

    /// Move to [`ConnectionState::Closed`] unless already there.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }
}
