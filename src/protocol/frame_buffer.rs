//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` so appends are amortized and frames are split off
//! without copying. Implements a state machine for fragmented frames:
//! - `WaitingForLength`: Need at least 4 bytes
//! - `WaitingForBody`: Length consumed, need N more body bytes
//! - `Skipping`: Oversized length consumed, N body bytes still to discard
//!
//! # Example
//!
//! ```
//! use skyline_session::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // Data arrives in chunks from the socket
//! assert!(buffer.push(&[0, 0, 0, 5]).unwrap().is_empty());
//! let frames = buffer.push(&[1, 2, 3, 4, 5]).unwrap();
//!
//! assert_eq!(frames.len(), 1);
//! assert_eq!(&frames[0][..], &[1, 2, 3, 4, 5]);
//! ```

use bytes::{Buf, Bytes, BytesMut};

use super::wire_format::{
    decode_length_prefix, validate_length, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE,
};
use crate::error::Result;

/// Default initial buffer capacity (64KB).
const DEFAULT_CAPACITY: usize = 64 * 1024;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Frame-aligned: waiting for a complete 4-byte length prefix.
    WaitingForLength,
    /// Prefix consumed, waiting for `length` body bytes.
    WaitingForBody { length: u32 },
    /// Body of a rejected frame: `remaining` bytes are dropped on arrival.
    Skipping { remaining: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// Purely a re-segmentation of the byte stream: bytes are never reordered.
/// The only bytes dropped are the body of a frame whose declared length is
/// over the limit; the stream stays aligned and the next frame is delivered.
#[derive(Debug)]
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed frame body size.
    max_frame_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max frame: 64MB.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new frame buffer with a custom frame size limit.
    pub fn with_max_frame_size(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(DEFAULT_CAPACITY),
            state: State::WaitingForLength,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data stays buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns `FrameTooLarge` if a declared length exceeds the limit. Frames
    /// completed earlier in the same call are discarded with it; use
    /// [`extend`](Self::extend) with [`next_frame`](Self::next_frame) to keep them.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.extend(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Append data to the buffer without extracting frames.
    ///
    /// While a rejected body is being skipped, its bytes are dropped here
    /// and never buffered.
    pub fn extend(&mut self, mut data: &[u8]) {
        if let State::Skipping { remaining } = self.state {
            let skip = data.len().min(remaining as usize);
            data = &data[skip..];
            self.finish_skip(remaining, skip);
        }
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract a single frame body from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(body))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` if the declared length is over the limit; that frame's
    ///   body is skipped and the following frames are still delivered
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        if let State::Skipping { remaining } = self.state {
            let skip = self.buffer.len().min(remaining as usize);
            self.buffer.advance(skip);
            self.finish_skip(remaining, skip);
        }

        if self.state == State::WaitingForLength {
            let Some(length) = decode_length_prefix(&self.buffer) else {
                return Ok(None);
            };

            self.buffer.advance(LENGTH_PREFIX_SIZE);

            if let Err(e) = validate_length(u64::from(length), self.max_frame_size) {
                let skip = self.buffer.len().min(length as usize);
                self.buffer.advance(skip);
                self.finish_skip(length, skip);
                return Err(e);
            }

            self.state = State::WaitingForBody { length };
        }

        let State::WaitingForBody { length } = self.state else {
            return Ok(None);
        };

        let length = length as usize;
        if self.buffer.len() < length {
            return Ok(None);
        }

        let body = self.buffer.split_to(length).freeze();
        self.state = State::WaitingForLength;
        Ok(Some(body))
    }

    fn finish_skip(&mut self, remaining: u32, skipped: usize) {
        // skipped <= remaining, so the cast is lossless.
        let remaining = remaining - skipped as u32;
        self.state = if remaining == 0 {
            State::WaitingForLength
        } else {
            State::Skipping { remaining }
        };
    }

    /// Length of the frame currently being awaited, if a prefix was consumed.
    pub fn pending_length(&self) -> Option<u32> {
        match self.state {
            State::WaitingForBody { length } => Some(length),
            State::WaitingForLength | State::Skipping { .. } => None,
        }
    }

    /// Bytes of a rejected frame still to be discarded, if any.
    pub fn skipping(&self) -> Option<u32> {
        match self.state {
            State::Skipping { remaining } => Some(remaining),
            _ => None,
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the configured frame size limit.
    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForLength;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::protocol::build_frame;
    use proptest::prelude::*;

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&build_frame(b"hello").unwrap()).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"hello");
        assert!(buffer.is_empty());
        assert_eq!(buffer.pending_length(), None);
    }

    #[test]
    fn test_prefix_then_body() {
        let mut buffer = FrameBuffer::new();

        let frames = buffer.push(&[0, 0, 0, 5]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.pending_length(), Some(5));
        assert!(buffer.is_empty());

        let frames = buffer.push(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &[1, 2, 3, 4, 5]);
        assert_eq!(buffer.pending_length(), None);
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = Vec::new();
        combined.extend(build_frame(b"first").unwrap());
        combined.extend(build_frame(b"second").unwrap());
        combined.extend(build_frame(b"third").unwrap());

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[0][..], b"first");
        assert_eq!(&frames[1][..], b"second");
        assert_eq!(&frames[2][..], b"third");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_prefix() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = build_frame(b"test").unwrap();

        let frames = buffer.push(&frame_bytes[..2]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.pending_length(), None);
        assert_eq!(buffer.len(), 2);

        let frames = buffer.push(&frame_bytes[2..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"test");
    }

    #[test]
    fn test_empty_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&[0, 0, 0, 0]).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_empty());
    }

    #[test]
    fn test_empty_frames_between_data() {
        let mut buffer = FrameBuffer::new();
        let mut data = build_frame(b"").unwrap();
        data.extend(build_frame(b"x").unwrap());
        data.extend(build_frame(b"").unwrap());

        let frames = buffer.push(&data).unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].is_empty());
        assert_eq!(&frames[1][..], b"x");
        assert!(frames[2].is_empty());
    }

    #[test]
    fn test_large_payload() {
        let mut buffer = FrameBuffer::new();
        let payload = vec![0xAB; 1024 * 1024]; // 1MB

        let frames = buffer.push(&build_frame(&payload).unwrap()).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 1024 * 1024);
        assert!(frames[0].iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_max_frame_size_validation() {
        let mut buffer = FrameBuffer::with_max_frame_size(100);

        let result = buffer.push(&[0, 0, 0x03, 0xE8, 1, 2, 3]);

        assert!(matches!(
            result,
            Err(SessionError::FrameTooLarge { length: 1000, max: 100 })
        ));
        assert!(buffer.is_empty());
        assert_eq!(buffer.pending_length(), None);
        assert_eq!(buffer.skipping(), Some(997));
    }

    #[test]
    fn test_next_frame_keeps_frames_before_oversized() {
        let mut buffer = FrameBuffer::with_max_frame_size(8);
        buffer.extend(&build_frame(b"ok").unwrap());
        buffer.extend(&[0, 0, 1, 0]);

        assert_eq!(&buffer.next_frame().unwrap().unwrap()[..], b"ok");
        assert!(buffer.next_frame().is_err());
        assert!(buffer.next_frame().unwrap().is_none());
        assert_eq!(buffer.skipping(), Some(256));
    }

    #[test]
    fn test_oversized_body_is_skipped_across_reads() {
        let mut buffer = FrameBuffer::with_max_frame_size(8);

        assert!(buffer.push(&[0, 0, 0, 20, 1, 2, 3, 4, 5]).is_err());
        assert_eq!(buffer.skipping(), Some(15));

        // Body bytes are dropped without being buffered.
        assert!(buffer.push(&[0xEE; 10]).unwrap().is_empty());
        assert!(buffer.is_empty());
        assert_eq!(buffer.skipping(), Some(5));

        let mut tail = vec![0xEE; 5];
        tail.extend(build_frame(b"next").unwrap());
        let frames = buffer.push(&tail).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"next");
        assert_eq!(buffer.skipping(), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_oversized_body_in_same_read_as_next_frame() {
        let mut buffer = FrameBuffer::with_max_frame_size(4);
        buffer.extend(&build_frame(b"too long").unwrap());
        buffer.extend(&build_frame(b"fit").unwrap());

        assert!(buffer.next_frame().is_err());
        assert_eq!(&buffer.next_frame().unwrap().unwrap()[..], b"fit");
        assert!(buffer.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_clear_stops_skipping() {
        let mut buffer = FrameBuffer::with_max_frame_size(4);
        assert!(buffer.push(&[0, 0, 0, 100]).is_err());

        buffer.clear();

        assert_eq!(buffer.skipping(), None);
        assert_eq!(&buffer.push(&build_frame(b"a").unwrap()).unwrap()[0][..], b"a");
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        buffer.push(&[0, 0, 0, 10, 1, 2]).unwrap();

        assert_eq!(buffer.pending_length(), Some(10));
        assert_eq!(buffer.len(), 2);

        buffer.clear();

        assert_eq!(buffer.pending_length(), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = FrameBuffer::new();

        let frame1 = build_frame(b"first").unwrap();
        let frame2 = build_frame(b"second").unwrap();

        let mut data = frame1.clone();
        data.extend_from_slice(&frame2[..5]);

        let frames = buffer.push(&data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"first");
        assert_eq!(buffer.pending_length(), Some(6));

        let frames = buffer.push(&frame2[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"second");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = build_frame(b"hi").unwrap();

        let mut all_frames = Vec::new();
        for byte in &frame_bytes {
            all_frames.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(&all_frames[0][..], b"hi");
    }

    proptest! {
        #[test]
        fn prop_chunked_feed_yields_payload(
            payload in prop::collection::vec(any::<u8>(), 0..2048),
            chunk in 1..64usize,
        ) {
            let mut buffer = FrameBuffer::new();
            let bytes = build_frame(&payload).unwrap();

            let mut frames = Vec::new();
            for piece in bytes.chunks(chunk) {
                frames.extend(buffer.push(piece).unwrap());
            }

            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(&frames[0][..], &payload[..]);
            prop_assert!(buffer.is_empty());
        }

        #[test]
        fn prop_split_point_does_not_change_result(
            payload in prop::collection::vec(any::<u8>(), 0..512),
            split in any::<prop::sample::Index>(),
        ) {
            let bytes = build_frame(&payload).unwrap();
            let k = split.index(bytes.len() + 1);

            let mut whole = FrameBuffer::new();
            let expected = whole.push(&bytes).unwrap();

            let mut parts = FrameBuffer::new();
            let mut actual = parts.push(&bytes[..k]).unwrap();
            actual.extend(parts.push(&bytes[k..]).unwrap());

            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn prop_oversized_frame_does_not_desync_stream(
            oversized in prop::collection::vec(any::<u8>(), 17..256),
            payload in prop::collection::vec(any::<u8>(), 0..16),
            chunk in 1..32usize,
        ) {
            let mut stream = build_frame(&oversized).unwrap();
            stream.extend(build_frame(&payload).unwrap());

            let mut buffer = FrameBuffer::with_max_frame_size(16);
            let mut frames = Vec::new();
            let mut errors = 0;
            for piece in stream.chunks(chunk) {
                buffer.extend(piece);
                loop {
                    match buffer.next_frame() {
                        Ok(Some(frame)) => frames.push(frame),
                        Ok(None) => break,
                        Err(_) => errors += 1,
                    }
                }
            }

            prop_assert_eq!(errors, 1);
            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(&frames[0][..], &payload[..]);
            prop_assert!(buffer.is_empty());
        }

        #[test]
        fn prop_concatenated_frames_keep_order(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16),
        ) {
            let mut stream = Vec::new();
            for payload in &payloads {
                stream.extend(build_frame(payload).unwrap());
            }

            let mut buffer = FrameBuffer::new();
            let frames = buffer.push(&stream).unwrap();

            prop_assert_eq!(frames.len(), payloads.len());
            for (frame, payload) in frames.iter().zip(&payloads) {
                prop_assert_eq!(&frame[..], &payload[..]);
            }
        }
    }
}
