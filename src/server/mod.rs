//! # Server
//!
//! One listener, one task per accepted connection.
//!
//! Each connection reads a request head, then either serves a single HTTP
//! request and closes, or completes a WebSocket handshake and stays open
//! until the peer disconnects.
//!
//! ```no_run
//! use duplex_gateway::http::Response;
//! use duplex_gateway::server::Server;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Server::builder()
//!     .http("/", |_req: &_| Ok(Response::ok().body("hello").build().into()))
//!     .bind()
//!     .await?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
#[allow(clippy::module_inception)]
pub mod server;
pub mod state;
pub mod stats;

pub use connection::ConnectionHandler;
pub use error::{ServerError, ServerResult};
pub use server::{Server, ServerBuilder, ShutdownHandle};
pub use state::{Connection, ConnectionState, Protocol};
pub use stats::{ServerStats, StatsSnapshot};
