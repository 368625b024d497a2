//! Length-prefixed framing for store frames
//!
//! ```text
//! [ 4 bytes: length (u32, big-endian) ][ N bytes: protobuf StoreFrame ]
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use thiserror::Error;

use crate::proto::StoreFrame;

/// Largest frame body accepted in either direction (10 MiB)
pub const MAX_FRAME_SIZE: u32 = 10 * 1024 * 1024;

const PREFIX_LEN: usize = 4;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes (max: {MAX_FRAME_SIZE})")]
    FrameTooLarge(usize),

    #[error("Invalid frame length prefix: {0}")]
    InvalidLength(u32),

    #[error("Protobuf decode error: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("Protobuf encode error: {0}")]
    EncodeError(#[from] prost::EncodeError),
}

/// Encode a frame with its length prefix
pub fn encode(frame: &StoreFrame) -> Result<Bytes, CodecError> {
    let body_len = frame.encoded_len();
    if body_len > MAX_FRAME_SIZE as usize {
        return Err(CodecError::FrameTooLarge(body_len));
    }

    let mut buf = BytesMut::with_capacity(PREFIX_LEN + body_len);
    buf.put_u32(body_len as u32);
    frame.encode(&mut buf)?;
    Ok(buf.freeze())
}

/// Try to take one complete frame off the front of `buf`
///
/// Returns `Ok(None)` and leaves `buf` untouched when more data is needed.
pub fn decode(buf: &mut BytesMut) -> Result<Option<StoreFrame>, CodecError> {
    if buf.len() < PREFIX_LEN {
        return Ok(None);
    }

    let body_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if body_len > MAX_FRAME_SIZE {
        return Err(CodecError::InvalidLength(body_len));
    }

    if buf.len() < PREFIX_LEN + body_len as usize {
        return Ok(None);
    }

    buf.advance(PREFIX_LEN);
    let body = buf.split_to(body_len as usize);
    Ok(Some(StoreFrame::decode(body)?))
}

/// Accumulates stream reads and yields complete frames
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Call repeatedly until it returns `Ok(None)` to drain all complete frames
    pub fn decode_next(&mut self) -> Result<Option<StoreFrame>, CodecError> {
        decode(&mut self.buffer)
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
