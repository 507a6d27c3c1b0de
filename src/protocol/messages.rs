//! Protobuf envelope definitions.
//!
//! Hand-maintained `prost` types for the backend's `innpv` protocol. Field
//! tags must stay in sync with the backend schema; unknown fields and
//! unknown oneof cases are skipped by `prost` when decoding.

use std::fmt;

/// Separator used when rendering a [`Path`].
pub const PATH_SEPARATOR: &str = "/";

// ============================================================================
// Client -> server
// ============================================================================

/// Outbound envelope.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FromClient {
    #[prost(uint32, tag = "1")]
    pub sequence_number: u32,
    #[prost(oneof = "from_client::Payload", tags = "2, 3, 4")]
    pub payload: Option<from_client::Payload>,
}

pub mod from_client {
    /// Payload carried by a [`FromClient`](super::FromClient) envelope.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        Initialize(super::InitializeRequest),
        #[prost(message, tag = "3")]
        Analysis(super::AnalysisRequest),
        #[prost(message, tag = "4")]
        Generic(super::GenericRequest),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InitializeRequest {
    #[prost(uint32, tag = "1")]
    pub protocol_version: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AnalysisRequest {
    #[prost(bool, tag = "1")]
    pub mock_response: bool,
}

/// Catch-all request for message kinds without a dedicated payload field.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GenericRequest {
    #[prost(string, tag = "1")]
    pub kind: String,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
}

// ============================================================================
// Server -> client
// ============================================================================

/// Inbound envelope.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FromServer {
    #[prost(uint32, tag = "1")]
    pub sequence_number: u32,
    #[prost(oneof = "from_server::Payload", tags = "2, 3, 5, 6, 8, 9")]
    pub payload: Option<from_server::Payload>,
}

pub mod from_server {
    /// Payload carried by a [`FromServer`](super::FromServer) envelope.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        Error(super::ProtocolError),
        #[prost(message, tag = "3")]
        Initialize(super::InitializeResponse),
        #[prost(message, tag = "5")]
        AnalysisError(super::AnalysisError),
        #[prost(message, tag = "6")]
        Throughput(super::ThroughputResponse),
        #[prost(message, tag = "8")]
        Breakdown(super::BreakdownResponse),
        #[prost(message, tag = "9")]
        Habitat(super::HabitatResponse),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrorCode {
    Unknown = 0,
    UnsupportedProtocolVersion = 1,
    UninitializedConnection = 2,
    AlreadyInitialized = 3,
}

impl ErrorCode {
    /// Name of the code as written in the protocol schema.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "UNKNOWN",
            ErrorCode::UnsupportedProtocolVersion => "UNSUPPORTED_PROTOCOL_VERSION",
            ErrorCode::UninitializedConnection => "UNINITIALIZED_CONNECTION",
            ErrorCode::AlreadyInitialized => "ALREADY_INITIALIZED",
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtocolError {
    #[prost(enumeration = "ErrorCode", tag = "1")]
    pub error_code: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InitializeResponse {
    #[prost(string, tag = "1")]
    pub server_project_root: String,
    #[prost(message, optional, tag = "2")]
    pub entry_point: Option<Path>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AnalysisError {
    #[prost(string, tag = "1")]
    pub error_message: String,
    #[prost(message, optional, tag = "2")]
    pub file_context: Option<FileReference>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ThroughputResponse {
    #[prost(float, tag = "1")]
    pub samples_per_second: f32,
    #[prost(float, tag = "2")]
    pub predicted_max_samples_per_second: f32,
    #[prost(message, optional, tag = "3")]
    pub run_time_ms: Option<LinearModel>,
    #[prost(message, optional, tag = "4")]
    pub peak_usage_bytes: Option<LinearModel>,
    #[prost(message, optional, tag = "5")]
    pub batch_size_context: Option<FileReference>,
    #[prost(bool, tag = "6")]
    pub can_manipulate_batch_size: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BreakdownResponse {
    #[prost(uint64, tag = "1")]
    pub peak_usage_bytes: u64,
    #[prost(uint64, tag = "2")]
    pub memory_capacity_bytes: u64,
    #[prost(float, tag = "3")]
    pub iteration_run_time_ms: f32,
    #[prost(message, repeated, tag = "4")]
    pub operation_tree: Vec<BreakdownNode>,
    #[prost(message, repeated, tag = "5")]
    pub weight_tree: Vec<BreakdownNode>,
    #[prost(uint32, tag = "6")]
    pub batch_size: u32,
}

/// One node of a breakdown tree, flattened in pre-order.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BreakdownNode {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(uint32, tag = "2")]
    pub num_children: u32,
    #[prost(message, repeated, tag = "3")]
    pub contexts: Vec<FileReference>,
    #[prost(oneof = "breakdown_node::Data", tags = "4, 5")]
    pub data: Option<breakdown_node::Data>,
}

pub mod breakdown_node {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Data {
        #[prost(message, tag = "4")]
        Operation(super::OperationData),
        #[prost(message, tag = "5")]
        Weight(super::WeightData),
    }
}

impl BreakdownNode {
    /// Operation metrics, if this node belongs to the operation tree.
    pub fn operation(&self) -> Option<&OperationData> {
        match &self.data {
            Some(breakdown_node::Data::Operation(op)) => Some(op),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OperationData {
    #[prost(uint64, tag = "1")]
    pub size_bytes: u64,
    #[prost(float, tag = "2")]
    pub forward_ms: f32,
    #[prost(float, tag = "3")]
    pub backward_ms: f32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WeightData {
    #[prost(uint64, tag = "1")]
    pub size_bytes: u64,
    #[prost(uint64, tag = "2")]
    pub grad_size_bytes: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HabitatResponse {
    #[prost(message, repeated, tag = "1")]
    pub predictions: Vec<HabitatDevicePrediction>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HabitatDevicePrediction {
    #[prost(string, tag = "1")]
    pub device_name: String,
    #[prost(float, tag = "2")]
    pub runtime_ms: f32,
}

// ============================================================================
// Shared
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileReference {
    #[prost(message, optional, tag = "1")]
    pub file_path: Option<Path>,
    #[prost(uint32, tag = "2")]
    pub line_number: u32,
}

/// A source path split into components.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Path {
    #[prost(string, repeated, tag = "1")]
    pub components: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LinearModel {
    #[prost(double, tag = "1")]
    pub slope: f64,
    #[prost(double, tag = "2")]
    pub bias: f64,
}

impl Path {
    /// Build a path from components.
    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    /// Components joined with [`PATH_SEPARATOR`].
    pub fn joined(&self) -> String {
        self.components.join(PATH_SEPARATOR)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

impl fmt::Display for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_path {
            Some(path) => write!(f, "{}:{}", path, self.line_number),
            None => write!(f, "<unknown>:{}", self.line_number),
        }
    }
}
