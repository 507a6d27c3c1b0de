//! Error types for skyline-session.

use thiserror::Error;

/// Main error type for all session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// I/O error on the backend socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protobuf envelope could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Protobuf envelope could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[from] prost::EncodeError),

    /// JSON serialization error (UI messages only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A frame declared a length above the configured limit.
    #[error("Frame length {length} exceeds maximum {max}")]
    FrameTooLarge { length: u64, max: u32 },

    /// Analysis was requested before the backend answered the handshake.
    #[error("Session is not initialized")]
    NotInitialized,

    /// Every `u32` sequence number has been used.
    #[error("Sequence numbers exhausted")]
    SequenceExhausted,

    /// The session was closed (peer disconnect or explicit teardown).
    #[error("Session closed")]
    Closed,
}

impl SessionError {
    /// Whether the session can keep running after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::Decode(_)
                | SessionError::FrameTooLarge { .. }
                | SessionError::NotInitialized
        )
    }
}

/// Result type alias using SessionError.
pub type Result<T> = std::result::Result<T, SessionError>;
