//! Protobuf codec using `prost`.
//!
//! Outbound envelopes are returned already framed (length prefix included),
//! ready to be handed to the writer task. Inbound frame bodies are decoded
//! into a [`ServerPayload`] that the session matches exhaustively.

use bytes::{BufMut, Bytes, BytesMut};
use prost::Message;

use crate::error::Result;
use crate::protocol::messages::{
    from_client, from_server, AnalysisError, AnalysisRequest, BreakdownResponse, FromClient,
    FromServer, GenericRequest, HabitatResponse, InitializeRequest, InitializeResponse,
    ProtocolError, ThroughputResponse,
};
use crate::protocol::{encode_length_prefix, validate_length, LENGTH_PREFIX_SIZE, PROTOCOL_VERSION};

/// A typed outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    Initialize(InitializeRequest),
    Analysis(AnalysisRequest),
    Generic(GenericRequest),
}

impl ClientRequest {
    /// Handshake request carrying [`PROTOCOL_VERSION`].
    pub fn initialize() -> Self {
        ClientRequest::Initialize(InitializeRequest {
            protocol_version: PROTOCOL_VERSION,
        })
    }

    /// Analysis request against the real backend (never a mock response).
    pub fn analysis() -> Self {
        ClientRequest::Analysis(AnalysisRequest {
            mock_response: false,
        })
    }

    /// Short name for logging.
    pub fn kind(&self) -> &str {
        match self {
            ClientRequest::Initialize(_) => "initialize",
            ClientRequest::Analysis(_) => "analysis",
            ClientRequest::Generic(generic) => &generic.kind,
        }
    }
}

impl From<ClientRequest> for from_client::Payload {
    fn from(request: ClientRequest) -> Self {
        match request {
            ClientRequest::Initialize(msg) => from_client::Payload::Initialize(msg),
            ClientRequest::Analysis(msg) => from_client::Payload::Analysis(msg),
            ClientRequest::Generic(msg) => from_client::Payload::Generic(msg),
        }
    }
}

/// Decoded inbound payload, one variant per payload tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPayload {
    Error(ProtocolError),
    Initialize(InitializeResponse),
    AnalysisError(AnalysisError),
    Throughput(ThroughputResponse),
    Breakdown(BreakdownResponse),
    Habitat(HabitatResponse),
    /// Payload absent, or a tag this client does not know.
    Unknown,
}

impl ServerPayload {
    /// Short name of the payload case for logging.
    pub fn case_name(&self) -> &'static str {
        match self {
            ServerPayload::Error(_) => "error",
            ServerPayload::Initialize(_) => "initialize",
            ServerPayload::AnalysisError(_) => "analysis_error",
            ServerPayload::Throughput(_) => "throughput",
            ServerPayload::Breakdown(_) => "breakdown",
            ServerPayload::Habitat(_) => "habitat",
            ServerPayload::Unknown => "unknown",
        }
    }
}

impl From<Option<from_server::Payload>> for ServerPayload {
    fn from(payload: Option<from_server::Payload>) -> Self {
        match payload {
            Some(from_server::Payload::Error(msg)) => ServerPayload::Error(msg),
            Some(from_server::Payload::Initialize(msg)) => ServerPayload::Initialize(msg),
            Some(from_server::Payload::AnalysisError(msg)) => ServerPayload::AnalysisError(msg),
            Some(from_server::Payload::Throughput(msg)) => ServerPayload::Throughput(msg),
            Some(from_server::Payload::Breakdown(msg)) => ServerPayload::Breakdown(msg),
            Some(from_server::Payload::Habitat(msg)) => ServerPayload::Habitat(msg),
            None => ServerPayload::Unknown,
        }
    }
}

/// A decoded inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerResponse {
    /// Backend's sequence number. Informational only; responses are routed by payload.
    pub sequence_number: u32,
    pub payload: ServerPayload,
}

/// Protobuf codec for the backend protocol.
pub struct ProtobufCodec;

impl ProtobufCodec {
    /// Encode a request as a complete frame (length prefix + envelope).
    ///
    /// # Errors
    ///
    /// Returns error if the envelope cannot be encoded.
    pub fn encode_request(sequence_number: u32, request: ClientRequest) -> Result<Bytes> {
        let envelope = FromClient {
            sequence_number,
            payload: Some(request.into()),
        };
        Self::encode_framed(&envelope)
    }

    /// Encode any envelope as a complete frame.
    pub fn encode_framed<M: Message>(message: &M) -> Result<Bytes> {
        let length = validate_length(message.encoded_len() as u64, u32::MAX)?;

        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + length as usize);
        buf.put_slice(&encode_length_prefix(length));
        message.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode a frame body into a typed response.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Decode` if the bytes are not a valid envelope.
    #[inline]
    pub fn decode_response(body: &[u8]) -> Result<ServerResponse> {
        let envelope = FromServer::decode(body)?;
        Ok(ServerResponse {
            sequence_number: envelope.sequence_number,
            payload: envelope.payload.into(),
        })
    }
}
