//! Routing errors.

use thiserror::Error;

/// Errors raised while building a router.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Pattern failed to compile as a regular expression.
    #[error("invalid route pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// Pattern registered twice for the same kind of endpoint.
    #[error("duplicate {kind} route: {pattern}")]
    DuplicateRoute {
        /// Endpoint kind, `http` or `websocket`.
        kind: &'static str,
        /// The repeated pattern.
        pattern: String,
    },

    /// Empty pattern.
    #[error("route pattern cannot be empty")]
    EmptyPattern,
}

/// Result type for routing operations.
pub type RoutingResult<T> = Result<T, RoutingError>;
