//! TCP transport to the backend.
//!
//! The backend listens on a fixed host/port; the session holds exactly one
//! connection and never reconnects.
//!
//! # Example
//!
//! ```ignore
//! use skyline_session::transport::connect;
//!
//! let stream = connect("localhost", 60120).await?;
//! let (reader, writer) = stream.into_split();
//! ```

use tokio::net::TcpStream;

use crate::error::Result;

/// Default backend host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default backend port.
pub const DEFAULT_PORT: u16 = 60120;

/// Connect to the backend.
///
/// Nagle is disabled: requests are small and latency matters more than
/// packet count.
pub async fn connect(host: &str, port: u16) -> Result<TcpStream> {
    let stream = TcpStream::connect((host, port)).await?;
    stream.set_nodelay(true)?;
    tracing::debug!(host, port, "Connected to backend socket");
    Ok(stream)
}
