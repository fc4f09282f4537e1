//! Server error types.

use super::state::{ConnectionState, Protocol};
use crate::config::ConfigError;
use crate::http::HttpError;
use crate::routing::RoutingError;
use crate::websocket::WebSocketError;
use std::io;
use thiserror::Error;

/// Errors raised while building or running a server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind the listening socket.
    #[error("failed to bind to {address}: {source}")]
    Bind {
        /// Address that could not be bound.
        address: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Unrecoverable accept failure.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// No route was registered.
    #[error("server has no routes")]
    NoRoutes,

    /// Invalid route table.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Connection state machine violation.
    #[error("invalid connection state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current state.
        from: ConnectionState,
        /// Requested state.
        to: ConnectionState,
    },

    /// Connection protocol already decided.
    #[error("connection already classified as {current:?}")]
    AlreadyClassified {
        /// Protocol set earlier.
        current: Protocol,
    },

    /// HTTP protocol failure on a connection.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// WebSocket protocol failure on a connection.
    #[error(transparent)]
    WebSocket(#[from] WebSocketError),

    /// IO error on an established connection.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::Bind {
            address: "127.0.0.1:80".to_string(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().starts_with("failed to bind to 127.0.0.1:80"));
    }

    #[test]
    fn test_transition_error_display() {
        let err = ServerError::InvalidTransition {
            from: ConnectionState::Closed,
            to: ConnectionState::WsOpen,
        };
        assert_eq!(
            err.to_string(),
            "invalid connection state transition: Closed -> WsOpen"
        );
    }
}
