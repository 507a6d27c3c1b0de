//! Protocol module - wire format, framing, and envelope types.
//!
//! This module implements the binary protocol spoken with the backend:
//! - 4-byte big-endian length prefix framing
//! - Frame buffer for accumulating partial reads
//! - Protobuf envelope definitions

mod frame_buffer;
pub mod messages;
mod wire_format;

pub use frame_buffer::FrameBuffer;
pub use messages::{FromClient, FromServer};
pub use wire_format::{
    build_frame, decode_length_prefix, encode_length_prefix, validate_length,
    DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE, PROTOCOL_VERSION,
};
