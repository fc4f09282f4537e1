//! WebSocket frame encoding and decoding (RFC 6455 section 5).

use super::error::{WebSocketError, WebSocketResult};
use crate::buffered::BufferedReader;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::AsyncRead;

/// Largest payload length carried directly in the second header byte.
pub const MAX_SHORT_PAYLOAD: usize = 125;

/// Largest payload length carried in the 16-bit extended field.
pub const MAX_EXTENDED16_PAYLOAD: usize = u16::MAX as usize;

const FIN_BIT: u8 = 0x80;
const MASK_BIT: u8 = 0x80;
const OPCODE_MASK: u8 = 0x0F;
const LEN_MASK: u8 = 0x7F;
const LEN_16: u8 = 126;
const LEN_64: u8 = 127;

/// WebSocket operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Continuation frame.
    Continuation,
    /// Text frame.
    Text,
    /// Binary frame.
    Binary,
    /// Close frame.
    Close,
    /// Ping frame.
    Ping,
    /// Pong frame.
    Pong,
    /// Reserved opcode (3-7, 11-15).
    Reserved(u8),
}

impl OpCode {
    /// Check if this is a control frame.
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }

    /// Check if this is a data frame.
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Text | Self::Binary | Self::Continuation)
    }
}

impl From<u8> for OpCode {
    fn from(value: u8) -> Self {
        match value & OPCODE_MASK {
            0 => Self::Continuation,
            1 => Self::Text,
            2 => Self::Binary,
            8 => Self::Close,
            9 => Self::Ping,
            10 => Self::Pong,
            other => Self::Reserved(other),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(value: OpCode) -> Self {
        match value {
            OpCode::Continuation => 0,
            OpCode::Text => 1,
            OpCode::Binary => 2,
            OpCode::Close => 8,
            OpCode::Ping => 9,
            OpCode::Pong => 10,
            OpCode::Reserved(code) => code & OPCODE_MASK,
        }
    }
}

/// Encoding used for the payload length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthTier {
    /// Length fits in the 7-bit field.
    Short,
    /// Marker 126 followed by a 16-bit big-endian length.
    Extended16,
    /// Marker 127 followed by a 64-bit big-endian length.
    Extended64,
}

impl LengthTier {
    /// Pick the smallest tier able to carry `len`.
    #[must_use]
    pub fn for_len(len: usize) -> Self {
        if len <= MAX_SHORT_PAYLOAD {
            Self::Short
        } else if len <= MAX_EXTENDED16_PAYLOAD {
            Self::Extended16
        } else {
            Self::Extended64
        }
    }

    /// Bytes taken by the extended length field.
    #[must_use]
    pub fn extended_len(self) -> usize {
        match self {
            Self::Short => 0,
            Self::Extended16 => 2,
            Self::Extended64 => 8,
        }
    }

    fn from_marker(marker: u8) -> Self {
        match marker {
            LEN_16 => Self::Extended16,
            LEN_64 => Self::Extended64,
            _ => Self::Short,
        }
    }
}

/// Total header length implied by the second header byte.
fn header_len(second: u8) -> usize {
    let mask = if second & MASK_BIT != 0 { 4 } else { 0 };
    2 + LengthTier::from_marker(second & LEN_MASK).extended_len() + mask
}

/// XOR `data` in place with the 4-byte masking key.
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// A single decoded frame. The payload is already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Operation code.
    pub opcode: OpCode,
    /// Masking key, present on client-to-server frames.
    pub mask: Option<[u8; 4]>,
    /// Payload data.
    pub payload: Bytes,
}

impl Frame {
    /// Length tier this frame's payload is encoded with.
    #[must_use]
    pub fn length_tier(&self) -> LengthTier {
        LengthTier::for_len(self.payload.len())
    }
}

/// Which side of the connection a codec decodes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Decodes client frames, which must be masked.
    Server,
    /// Decodes server frames, which are never masked.
    Client,
}

#[derive(Debug)]
struct Header {
    fin: bool,
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    header_len: usize,
    payload_len: usize,
}

/// Frame encoder/decoder with a payload size cap.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    role: Role,
    max_payload: usize,
}

impl FrameCodec {
    /// Server-side codec accepting payloads up to `max_payload` bytes.
    #[must_use]
    pub fn new(max_payload: usize) -> Self {
        Self {
            role: Role::Server,
            max_payload,
        }
    }

    /// Client-side codec, used to read what a server sends.
    #[must_use]
    pub fn client(max_payload: usize) -> Self {
        Self {
            role: Role::Client,
            max_payload,
        }
    }

    /// Largest accepted payload.
    #[must_use]
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    fn parse_header(&self, buf: &[u8]) -> WebSocketResult<Option<Header>> {
        if buf.len() < 2 {
            return Ok(None);
        }
        let (first, second) = (buf[0], buf[1]);
        let masked = second & MASK_BIT != 0;

        match (self.role, masked) {
            (Role::Server, false) => {
                return Err(WebSocketError::InvalidFrame(
                    "client frame is not masked".to_string(),
                ))
            },
            (Role::Client, true) => {
                return Err(WebSocketError::InvalidFrame(
                    "server frame is masked".to_string(),
                ))
            },
            _ => {},
        }

        let header_len = header_len(second);
        if buf.len() < header_len {
            return Ok(None);
        }

        let declared = match LengthTier::from_marker(second & LEN_MASK) {
            LengthTier::Short => u64::from(second & LEN_MASK),
            LengthTier::Extended16 => u64::from(u16::from_be_bytes([buf[2], buf[3]])),
            LengthTier::Extended64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[2..10]);
                let len = u64::from_be_bytes(raw);
                if len >> 63 != 0 {
                    return Err(WebSocketError::InvalidFrame(
                        "64-bit payload length has its high bit set".to_string(),
                    ));
                }
                len
            },
        };

        if declared > self.max_payload as u64 {
            return Err(WebSocketError::FrameTooLarge {
                max: self.max_payload,
                actual: declared,
            });
        }

        let mask = masked.then(|| {
            let at = header_len - 4;
            [buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]
        });

        Ok(Some(Header {
            fin: first & FIN_BIT != 0,
            opcode: OpCode::from(first),
            mask,
            header_len,
            // Bounded by max_payload above.
            payload_len: declared as usize,
        }))
    }

    fn build_frame(header: &Header, raw: &[u8]) -> Frame {
        let start = header.header_len;
        let mut payload = BytesMut::from(&raw[start..start + header.payload_len]);
        if let Some(mask) = header.mask {
            apply_mask(&mut payload, mask);
        }
        Frame {
            fin: header.fin,
            opcode: header.opcode,
            mask: header.mask,
            payload: payload.freeze(),
        }
    }

    /// Decode one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed, otherwise the frame and
    /// the number of bytes it occupied.
    pub fn decode(&self, buf: &[u8]) -> WebSocketResult<Option<(Frame, usize)>> {
        let Some(header) = self.parse_header(buf)? else {
            return Ok(None);
        };
        let total = header.header_len + header.payload_len;
        if buf.len() < total {
            return Ok(None);
        }
        Ok(Some((Self::build_frame(&header, buf), total)))
    }

    /// Read the next complete frame, accumulating partial reads.
    ///
    /// Bytes that belong to the following frame remain in `reader`.
    pub async fn read_frame<R: AsyncRead + Unpin>(
        &self,
        reader: &mut BufferedReader<R>,
    ) -> WebSocketResult<Frame> {
        reader.read_at_least(2).await?;
        reader.read_at_least(header_len(reader.buffer()[1])).await?;

        let header = self
            .parse_header(reader.buffer())?
            .ok_or_else(|| WebSocketError::InvalidFrame("truncated header".to_string()))?;

        let total = header.header_len + header.payload_len;
        reader.read_at_least(total).await?;

        let frame = Self::build_frame(&header, reader.buffer());
        reader.advance(total);
        Ok(frame)
    }

    /// Encode a single unmasked frame with FIN set.
    #[must_use]
    pub fn encode(opcode: OpCode, payload: &[u8]) -> Bytes {
        encode_frame(opcode, payload, None)
    }

    /// Encode a text message the way the server sends it: `0x81`, unmasked.
    #[must_use]
    pub fn encode_text(text: &str) -> Bytes {
        encode_frame(OpCode::Text, text.as_bytes(), None)
    }

    /// Encode a masked frame, as a client would send it.
    #[must_use]
    pub fn encode_masked(opcode: OpCode, payload: &[u8], mask: [u8; 4]) -> Bytes {
        encode_frame(opcode, payload, Some(mask))
    }
}

fn encode_frame(opcode: OpCode, payload: &[u8], mask: Option<[u8; 4]>) -> Bytes {
    let len = payload.len();
    let tier = LengthTier::for_len(len);
    let mask_len = if mask.is_some() { 4 } else { 0 };
    let mut buf = BytesMut::with_capacity(2 + tier.extended_len() + mask_len + len);

    buf.put_u8(FIN_BIT | u8::from(opcode));
    let mask_bit = if mask.is_some() { MASK_BIT } else { 0 };
    match tier {
        LengthTier::Short => buf.put_u8(mask_bit | len as u8),
        LengthTier::Extended16 => {
            buf.put_u8(mask_bit | LEN_16);
            buf.put_u16(len as u16);
        },
        LengthTier::Extended64 => {
            buf.put_u8(mask_bit | LEN_64);
            buf.put_u64(len as u64);
        },
    }

    match mask {
        Some(key) => {
            buf.put_slice(&key);
            let start = buf.len();
            buf.put_slice(payload);
            apply_mask(&mut buf[start..], key);
        },
        None => buf.put_slice(payload),
    }

    buf.freeze()
}
