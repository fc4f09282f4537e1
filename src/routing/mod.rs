//! # Routing
//!
//! Maps request paths to endpoints. Every route is registered with an
//! explicit [`Endpoint`] kind, so dispatch never has to guess whether a
//! path serves HTTP or WebSocket.

pub mod error;
pub mod pattern;
pub mod router;

pub use error::{RoutingError, RoutingResult};
pub use pattern::PathPattern;
pub use router::{Endpoint, Route, Router, SocketRoute};
