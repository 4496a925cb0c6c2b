//! Length-prefixed message framing.
//!
//! Every message travels as one frame:
//!
//! ```text
//! +------+----------------+-------------------+
//! | flag | length (u32 BE)| JSON payload      |
//! +------+----------------+-------------------+
//!   1 B        4 B          `length` bytes
//! ```
//!
//! The flag must be 0 (uncompressed).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Bytes before the payload.
pub const HEADER_LEN: usize = 5;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid message payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported compression flag {0}")]
    Compressed(u8),

    #[error("Message of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },

    #[error("Body ended inside a frame ({buffered} bytes buffered)")]
    Truncated { buffered: usize },

    #[error("Unexpected bytes after message")]
    Trailing,
}

/// Encode `message` as one frame.
pub fn encode<T: Serialize>(message: &T) -> Result<Bytes, CodecError> {
    let payload = serde_json::to_vec(message)?;
    let len = u32::try_from(payload.len()).map_err(|_| CodecError::TooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_u8(0);
    frame.put_u32(len);
    frame.extend_from_slice(&payload);
    Ok(frame.freeze())
}

/// Decode a body that must hold exactly one frame.
pub fn decode_message<T: DeserializeOwned>(body: &[u8], max_message_bytes: usize) -> Result<T, CodecError> {
    let mut decoder = FrameDecoder::new(max_message_bytes);
    decoder.extend(body);
    let message = decoder.decode()?.ok_or(CodecError::Truncated {
        buffered: decoder.buffered(),
    })?;
    if !decoder.is_empty() {
        return Err(CodecError::Trailing);
    }
    Ok(message)
}

/// Reassembles frames from arbitrarily split body chunks.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_message_bytes: usize,
}

impl FrameDecoder {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_message_bytes,
        }
    }

    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Decode the next complete frame, or `None` if more bytes are needed.
    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<Option<T>, CodecError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let flag = self.buf[0];
        if flag != 0 {
            return Err(CodecError::Compressed(flag));
        }
        let len = u32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]) as usize;
        if len > self.max_message_bytes {
            return Err(CodecError::TooLarge {
                len,
                max: self.max_message_bytes,
            });
        }
        if self.buf.len() < HEADER_LEN + len {
            return Ok(None);
        }

        self.buf.advance(HEADER_LEN);
        let payload = self.buf.split_to(len);
        Ok(Some(serde_json::from_slice(&payload)?))
    }

    /// No partial frame is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
