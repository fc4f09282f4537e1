//! # WebSocket
//!
//! RFC 6455 server support without extensions or sub-protocols.
//!
//! - [`Handshake`] validates an upgrade request and builds the 101 response
//! - [`FrameCodec`] decodes masked client frames and encodes unmasked server
//!   frames, picking the 7-bit, 16-bit or 64-bit length field by size
//! - [`Message`] is what socket views receive

pub mod error;
pub mod frame;
pub mod message;
pub mod upgrade;

pub use error::{WebSocketError, WebSocketResult};
pub use frame::{apply_mask, Frame, FrameCodec, LengthTier, OpCode, Role};
pub use message::Message;
pub use upgrade::{compute_accept_key, is_websocket_upgrade, validate_key, Handshake};
