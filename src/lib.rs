//! # Duplex Gateway
//!
//! An HTTP/1.1 and WebSocket server sharing one listening socket, with
//! path-based routing to application views.
//!
//! ## Features
//!
//! - Single-request HTTP/1.1 with `Content-Length` and chunked bodies
//! - RFC 6455 WebSocket upgrades on the same port
//! - Per-route client registries for addressing and broadcasting
//! - File downloads, CORS and `X-Frame-Options` headers
//!
//! ## Architecture
//!
//! The [`server`] accepts connections and classifies each one from its
//! first request head. HTTP requests go to an [`view::HttpView`] chosen by
//! the [`routing::Router`]; WebSocket upgrades go to a [`view::SocketView`]
//! whose clients are tracked in a [`registry::ClientRegistry`].

pub mod buffered;
pub mod config;
pub mod http;
pub mod registry;
pub mod routing;
pub mod server;
pub mod view;
pub mod websocket;

pub use server::{Server, ServerBuilder, ServerError};
pub use view::{Admission, BoxError, HttpView, SocketView};
