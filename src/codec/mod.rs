//! Codec module - typed requests and responses over protobuf envelopes.
//!
//! - [`ProtobufCodec`] - encodes [`ClientRequest`] into framed `FromClient`
//!   envelopes and decodes frame bodies into [`ServerResponse`]
//!
//! # Design
//!
//! The codec is a marker struct with static methods rather than a trait
//! object. Outbound requests are a Rust enum, so an envelope always carries
//! exactly one payload field.
//!
//! # Example
//!
//! ```
//! use skyline_session::codec::{ClientRequest, ProtobufCodec, ServerPayload};
//!
//! let framed = ProtobufCodec::encode_request(0, ClientRequest::initialize()).unwrap();
//! assert_eq!(u32::from_be_bytes([framed[0], framed[1], framed[2], framed[3]]) as usize, framed.len() - 4);
//!
//! // An empty body is a valid envelope with no payload.
//! let response = ProtobufCodec::decode_response(&[]).unwrap();
//! assert!(matches!(response.payload, ServerPayload::Unknown));
//! ```

mod protobuf;

pub use protobuf::{ClientRequest, ProtobufCodec, ServerPayload, ServerResponse};
