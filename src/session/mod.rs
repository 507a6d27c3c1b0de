//! Session state machine.
//!
//! [`Session`] owns everything that changes while talking to the backend:
//! the frame buffer, the outbound sequence counter and the response slots.
//! It performs no I/O. The caller feeds it transport events and writes the
//! frames it returns, which keeps the whole protocol testable without a
//! socket.
//!
//! ```text
//! Connecting ──on_connected──► Ready ──frame──► Receiving ──┐
//!                                                  ▲        │ frame
//!                                                  └────────┘
//! Ready / Receiving ──oversized frame──► Error ──frame──► Receiving
//! any ──on_closed / transport error──► Closed
//! ```
//!
//! # Example
//!
//! ```
//! use skyline_session::session::{Session, SessionState};
//!
//! let mut session = Session::new();
//! let handshake = session.on_connected().unwrap();
//!
//! assert_eq!(session.state(), SessionState::Ready);
//! assert_eq!(session.next_sequence_number(), 1);
//! assert!(!handshake.is_empty());
//! ```

mod slots;

pub use slots::ResponseSlots;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::codec::{ClientRequest, ProtobufCodec, ServerPayload};
use crate::error::{Result, SessionError};
use crate::location_index::LocationIndex;
use crate::protocol::messages::{AnalysisError, ProtocolError};
use crate::protocol::{FrameBuffer, DEFAULT_MAX_FRAME_SIZE};
use crate::snapshot::Snapshot;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport not yet connected.
    Connecting,
    /// Handshake sent, nothing received yet.
    Ready,
    /// At least one frame received.
    Receiving,
    /// Last inbound frame was rejected as oversized. Its body is skipped
    /// and the frames after it are still processed.
    Error,
    /// Transport closed. Terminal.
    Closed,
}

impl SessionState {
    /// Whether inbound frames are still processed in this state.
    pub fn accepts_frames(&self) -> bool {
        matches!(
            self,
            SessionState::Ready | SessionState::Receiving | SessionState::Error
        )
    }
}

/// Something the caller should forward to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The backend answered the handshake; analysis may be requested.
    Initialized,
    /// Fresh snapshot after a slot update.
    Snapshot(Snapshot),
    /// Fresh location index after a breakdown update.
    Locations(LocationIndex),
    /// Human-readable error for the UI.
    Error(String),
}

/// Sans-IO session engine.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    frames: FrameBuffer,
    next_sequence: u64,
    slots: ResponseSlots,
    restart_requested: bool,
}

impl Session {
    /// Create a session with the default frame size limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a session with a custom frame size limit.
    pub fn with_max_frame_size(max_frame_size: u32) -> Self {
        Self {
            state: SessionState::Connecting,
            frames: FrameBuffer::with_max_frame_size(max_frame_size),
            next_sequence: 0,
            slots: ResponseSlots::default(),
            restart_requested: false,
        }
    }

    /// Transport connected: returns the framed handshake to send.
    pub fn on_connected(&mut self) -> Result<Bytes> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }

        info!("Connected to backend, sending initialization request");
        self.state = SessionState::Ready;
        self.encode(ClientRequest::initialize())
    }

    /// Request an analysis run: returns the framed request to send.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before the backend answered the handshake,
    /// `Closed` once the transport is gone, `SequenceExhausted` after
    /// `u32::MAX` requests.
    pub fn begin_analysis(&mut self) -> Result<Bytes> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        if !self.is_initialized() {
            return Err(SessionError::NotInitialized);
        }

        info!("Sending analysis request");
        self.encode(ClientRequest::analysis())
    }

    /// Encode any request with the next sequence number.
    pub fn send(&mut self, request: ClientRequest) -> Result<Bytes> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        self.encode(request)
    }

    fn encode(&mut self, request: ClientRequest) -> Result<Bytes> {
        let sequence_number =
            u32::try_from(self.next_sequence).map_err(|_| SessionError::SequenceExhausted)?;
        debug!(kind = request.kind(), sequence_number, "Encoding request");

        let frame = ProtobufCodec::encode_request(sequence_number, request)?;
        self.next_sequence += 1;
        Ok(frame)
    }

    /// Mark that the backend should be restarted.
    ///
    /// The caller is responsible for killing the backend process; the
    /// session itself never reconnects.
    pub fn restart_profiling(&mut self) {
        info!("Restart requested");
        self.restart_requested = true;
    }

    /// Feed bytes read from the transport.
    ///
    /// Every complete frame is processed before returning, in arrival order.
    pub fn on_data(&mut self, data: &[u8]) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        if !self.state.accepts_frames() {
            debug!(state = ?self.state, len = data.len(), "Dropping inbound bytes");
            return events;
        }

        self.frames.extend(data);
        loop {
            match self.frames.next_frame() {
                Ok(Some(body)) => self.handle_frame(&body, &mut events),
                Ok(None) => break,
                Err(e) => {
                    warn!("Skipping oversized frame: {}", e);
                    self.state = SessionState::Error;
                    events.push(SessionEvent::Error(e.to_string()));
                }
            }
        }

        events
    }

    fn handle_frame(&mut self, body: &[u8], events: &mut Vec<SessionEvent>) {
        self.state = SessionState::Receiving;

        let response = match ProtobufCodec::decode_response(body) {
            Ok(response) => response,
            Err(e) => {
                warn!(len = body.len(), "Discarding undecodable message: {}", e);
                events.push(SessionEvent::Error(format!("Malformed message: {}", e)));
                return;
            }
        };

        debug!(
            case = response.payload.case_name(),
            sequence_number = response.sequence_number,
            "Received message"
        );

        match response.payload {
            ServerPayload::Error(err) => {
                events.push(SessionEvent::Error(protocol_error_text(&err)));
                return;
            }
            ServerPayload::AnalysisError(err) => {
                events.push(SessionEvent::Error(analysis_error_text(&err)));
                return;
            }
            ServerPayload::Unknown => {
                debug!("Ignoring message without a known payload");
                return;
            }
            ServerPayload::Initialize(msg) => {
                info!(project_root = %msg.server_project_root, "Backend initialized");
                self.slots.initialize = Some(msg);
                events.push(SessionEvent::Initialized);
            }
            ServerPayload::Throughput(msg) => self.slots.throughput = Some(msg),
            ServerPayload::Breakdown(msg) => {
                let index = LocationIndex::build(&msg);
                self.slots.breakdown = Some(msg);
                events.push(SessionEvent::Locations(index));
            }
            ServerPayload::Habitat(msg) => self.slots.habitat = Some(msg),
        }

        events.push(SessionEvent::Snapshot(self.snapshot()));
    }

    /// Record a transport failure. The session is closed afterwards.
    pub fn on_transport_error(&mut self, error: &SessionError) -> SessionEvent {
        warn!("Transport error: {}", error);
        self.on_closed();
        SessionEvent::Error(error.to_string())
    }

    /// Transport closed: tear down buffered and received state.
    pub fn on_closed(&mut self) {
        if self.state != SessionState::Closed {
            info!("Backend connection closed");
        }
        self.state = SessionState::Closed;
        self.frames.clear();
        self.slots.clear();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether an Initialize response has been received.
    pub fn is_initialized(&self) -> bool {
        self.slots.initialize.is_some()
    }

    /// Whether a restart was requested.
    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    /// Sequence number the next outbound request will carry.
    ///
    /// Past `u32::MAX` every request fails with `SequenceExhausted`.
    pub fn next_sequence_number(&self) -> u64 {
        self.next_sequence
    }

    /// Current response slots.
    pub fn slots(&self) -> &ResponseSlots {
        &self.slots
    }

    /// Snapshot of the current slots.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::build(&self.slots)
    }

    /// Location index of the current breakdown, if any.
    pub fn location_index(&self) -> Option<LocationIndex> {
        self.slots.breakdown.as_ref().map(LocationIndex::build)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn protocol_error_text(err: &ProtocolError) -> String {
    format!("Protocol error: {}", err.error_code().as_str_name())
}

fn analysis_error_text(err: &AnalysisError) -> String {
    match &err.file_context {
        Some(context) => format!("{} ({})", err.error_message, context),
        None => err.error_message.clone(),
    }
}
