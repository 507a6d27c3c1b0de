//! # skyline-session
//!
//! Client-side session engine for the Skyline deep-learning profiler.
//!
//! The session talks to the profiling backend over one TCP connection,
//! exchanging length-prefixed protobuf messages, and turns the backend's
//! responses into JSON snapshots and per-line source annotations for a UI.
//!
//! ## Architecture
//!
//! - **Protocol**: frame decoder and wire message types
//! - **Codec**: protobuf encode/decode of framed messages
//! - **Session**: sans-IO state machine and response aggregation
//! - **Client**: async event loop driving the session over a socket
//!
//! ## Example
//!
//! ```ignore
//! use skyline_session::{Client, Command, UiMessage, Unmanaged};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::builder().port(60120).connect(Unmanaged).await?;
//!
//!     while let Some(message) = client.next_ui_message().await {
//!         if let UiMessage::Analysis(_) = &message {
//!             client.command(Command::BeginAnalysis).await?;
//!         }
//!         println!("{}", message.to_json()?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod location_index;
pub mod process;
pub mod protocol;
pub mod session;
pub mod snapshot;
pub mod transport;
pub mod ui;

mod client;
mod writer;

pub use client::{Client, ClientBuilder, SessionSummary, DEFAULT_READ_BUFFER_SIZE};
pub use error::{Result, SessionError};
pub use location_index::LocationIndex;
pub use process::{ProcessControl, Unmanaged};
pub use session::{Session, SessionEvent, SessionState};
pub use snapshot::Snapshot;
pub use ui::{Command, UiMessage};
