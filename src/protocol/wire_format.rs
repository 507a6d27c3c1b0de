//! Wire format encoding and decoding.
//!
//! Every message on the backend socket is a single frame:
//! ```text
//! ┌──────────────┬──────────────────────────┐
//! │ Length       │ Envelope                 │
//! │ 4 bytes      │ `Length` bytes           │
//! │ uint32 BE    │ protobuf FromClient/...  │
//! └──────────────┴──────────────────────────┘
//! ```
//!
//! The length counts envelope bytes only, never the prefix itself.

use crate::error::{Result, SessionError};

/// Length prefix size in bytes (fixed, exactly 4).
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum frame size (64 MB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// Protocol version sent in the initial handshake.
pub const PROTOCOL_VERSION: u32 = 5;

/// Encode a frame length as a big-endian prefix.
#[inline]
pub fn encode_length_prefix(length: u32) -> [u8; LENGTH_PREFIX_SIZE] {
    length.to_be_bytes()
}

/// Decode a big-endian length prefix.
///
/// Returns `None` if fewer than 4 bytes are available.
#[inline]
pub fn decode_length_prefix(buf: &[u8]) -> Option<u32> {
    let prefix: [u8; LENGTH_PREFIX_SIZE] = buf.get(..LENGTH_PREFIX_SIZE)?.try_into().ok()?;
    Some(u32::from_be_bytes(prefix))
}

/// Check a payload length against the frame limit.
pub fn validate_length(length: u64, max_frame_size: u32) -> Result<u32> {
    if length > u64::from(max_frame_size) {
        return Err(SessionError::FrameTooLarge {
            length,
            max: max_frame_size,
        });
    }
    // max_frame_size is a u32, so this cannot truncate.
    Ok(length as u32)
}

/// Build a complete frame (prefix + payload) as a single byte vector.
///
/// # Errors
///
/// Returns `FrameTooLarge` if the payload does not fit a 32-bit length.
///
/// # Example
///
/// ```
/// use skyline_session::protocol::build_frame;
///
/// let bytes = build_frame(b"hello").unwrap();
/// assert_eq!(bytes, [0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o']);
/// ```
pub fn build_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let length = validate_length(payload.len() as u64, u32::MAX)?;
    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&encode_length_prefix(length));
    buf.extend_from_slice(payload);
    Ok(buf)
}
