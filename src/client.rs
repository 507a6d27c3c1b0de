//! Client builder and event loop.
//!
//! The [`ClientBuilder`] configures the connection and builds the client.
//! The [`Client`] manages the lifecycle:
//! 1. Connect to the backend socket
//! 2. Send the Initialize handshake
//! 3. Drain socket reads and UI commands in one event loop
//! 4. Forward snapshots, overlays and errors to the UI channel
//!
//! # Example
//!
//! ```ignore
//! use skyline_session::{Client, Unmanaged};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::builder()
//!         .host("localhost")
//!         .port(60120)
//!         .connect(Unmanaged)
//!         .await?;
//!
//!     while let Some(message) = client.next_ui_message().await {
//!         println!("{}", message.to_json()?);
//!     }
//!     Ok(())
//! }
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SessionError};
use crate::process::ProcessControl;
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;
use crate::session::{Session, SessionEvent, SessionState};
use crate::transport::{self, DEFAULT_HOST, DEFAULT_PORT};
use crate::ui::{Command, UiMessage};
use crate::writer::{spawn_writer_task, WriterHandle, DEFAULT_CHANNEL_CAPACITY};

/// Default socket read buffer size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Builder for configuring and creating a session client.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    host: String,
    port: u16,
    max_frame_size: u32,
    channel_capacity: usize,
    read_buffer_size: usize,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    /// Set the backend host.
    ///
    /// Default: localhost
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the backend port.
    ///
    /// Default: 60120
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the largest inbound frame accepted. Bodies of larger frames are
    /// skipped and reported to the UI as errors.
    ///
    /// Default: 64 MB
    pub fn max_frame_size(mut self, limit: u32) -> Self {
        self.max_frame_size = limit;
        self
    }

    /// Set the capacity of the command, UI and writer channels.
    ///
    /// Default: 64
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Set the socket read buffer size.
    ///
    /// Default: 64 KB
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Connect to the backend and start the event loop.
    pub async fn connect<P: ProcessControl>(self, process: P) -> Result<Client> {
        let stream = transport::connect(&self.host, self.port).await?;
        info!(host = %self.host, port = self.port, "Session connected");

        let (reader, writer) = stream.into_split();
        Ok(self.start(reader, writer, process))
    }

    /// Start the event loop on an already connected stream.
    pub fn attach<S, P>(self, stream: S, process: P) -> Client
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
        P: ProcessControl,
    {
        let (reader, writer) = tokio::io::split(stream);
        self.start(reader, writer, process)
    }

    fn start<R, W, P>(self, reader: R, writer: W, process: P) -> Client
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        P: ProcessControl,
    {
        let (writer, writer_task) = spawn_writer_task(writer, self.channel_capacity);
        let (command_tx, command_rx) = mpsc::channel(self.channel_capacity);
        let (ui_tx, ui_rx) = mpsc::channel(self.channel_capacity);

        let event_loop = EventLoop {
            session: Session::with_max_frame_size(self.max_frame_size),
            writer,
            ui: ui_tx,
            process,
            read_buffer_size: self.read_buffer_size,
        };
        let task = tokio::spawn(event_loop.run(reader, command_rx));

        Client {
            commands: command_tx,
            ui: ui_rx,
            task,
            _writer_task: writer_task,
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Final state of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// State when the loop stopped.
    pub state: SessionState,
    /// Whether the backend should be restarted by its owner.
    pub restart_requested: bool,
}

/// A running session client.
///
/// Send commands with the async methods, read UI messages with
/// [`next_ui_message`](Self::next_ui_message).
pub struct Client {
    commands: mpsc::Sender<Command>,
    ui: mpsc::Receiver<UiMessage>,
    task: JoinHandle<SessionSummary>,
    _writer_task: JoinHandle<Result<()>>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Send a command to the event loop.
    pub async fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Ask the backend for an analysis.
    pub async fn begin_analysis(&self) -> Result<()> {
        self.command(Command::BeginAnalysis).await
    }

    /// Flag a restart and hard-kill the backend.
    pub async fn restart_profiling(&self) -> Result<()> {
        self.command(Command::RestartProfiling).await
    }

    /// Forward a document edit notification to the UI.
    pub async fn notify_text_changed(&self) -> Result<()> {
        self.command(Command::TextChanged).await
    }

    /// Close the connection.
    pub async fn shutdown(&self) -> Result<()> {
        self.command(Command::Shutdown).await
    }

    /// A sender for wiring UI callbacks straight to the event loop.
    pub fn command_sender(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    /// Next message for the UI, or `None` once the session has ended.
    pub async fn next_ui_message(&mut self) -> Option<UiMessage> {
        self.ui.recv().await
    }

    /// Wait for the event loop to finish.
    ///
    /// Pending UI messages are discarded.
    pub async fn wait_for_shutdown(self) -> Result<SessionSummary> {
        // Unblocks a loop waiting on a full UI channel.
        drop(self.ui);

        self.task
            .await
            .map_err(|e| SessionError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }
}

/// State owned by the event loop task.
struct EventLoop<P> {
    session: Session,
    writer: WriterHandle,
    ui: mpsc::Sender<UiMessage>,
    process: P,
    read_buffer_size: usize,
}

/// Whether the loop keeps running after handling an input.
enum Flow {
    Continue,
    Stop,
}

impl<P: ProcessControl> EventLoop<P> {
    async fn run<R>(mut self, mut reader: R, mut commands: mpsc::Receiver<Command>) -> SessionSummary
    where
        R: AsyncRead + Unpin,
    {
        match self.session.on_connected() {
            Ok(handshake) => {
                if let Err(e) = self.writer.send(handshake).await {
                    self.fail(e).await;
                    return self.summary();
                }
            }
            Err(e) => {
                error!("Failed to build handshake: {}", e);
                return self.summary();
            }
        }

        let mut buf = vec![0u8; self.read_buffer_size];

        loop {
            let flow = tokio::select! {
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        self.session.on_closed();
                        Flow::Stop
                    }
                    Ok(n) => {
                        self.handle_data(&buf[..n]).await;
                        Flow::Continue
                    }
                    Err(e) => {
                        self.fail(e.into()).await;
                        Flow::Stop
                    }
                },
                command = commands.recv() => self.handle_command(command).await,
            };

            if let Flow::Stop = flow {
                break;
            }
        }

        self.summary()
    }

    async fn handle_data(&mut self, data: &[u8]) {
        debug!(len = data.len(), "Received data");
        for event in self.session.on_data(data) {
            self.forward(event).await;
        }
    }

    async fn handle_command(&mut self, command: Option<Command>) -> Flow {
        let Some(command) = command else {
            debug!("All command senders dropped");
            self.session.on_closed();
            return Flow::Stop;
        };
        debug!(?command, "Handling command");

        match command {
            Command::BeginAnalysis => match self.session.begin_analysis() {
                Ok(frame) => {
                    if let Err(e) = self.writer.send(frame).await {
                        self.fail(e).await;
                        return Flow::Stop;
                    }
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Analysis request rejected: {}", e);
                    self.forward(SessionEvent::Error(e.to_string())).await;
                }
                Err(e) => {
                    error!("Cannot send analysis request: {}", e);
                    self.fail(e).await;
                    return Flow::Stop;
                }
            },
            Command::RestartProfiling => {
                self.session.restart_profiling();
                self.process.kill();
            }
            Command::TextChanged => self.post(UiMessage::TextChange).await,
            Command::Shutdown => {
                self.session.on_closed();
                return Flow::Stop;
            }
        }

        Flow::Continue
    }

    async fn fail(&mut self, error: SessionError) {
        let event = self.session.on_transport_error(&error);
        self.forward(event).await;
    }

    async fn forward(&mut self, event: SessionEvent) {
        let message = match event {
            SessionEvent::Initialized => return,
            SessionEvent::Snapshot(snapshot) => UiMessage::Analysis(snapshot),
            SessionEvent::Locations(files) => UiMessage::Highlights { files },
            SessionEvent::Error(error_text) => UiMessage::Error { error_text },
        };
        self.post(message).await;
    }

    async fn post(&mut self, message: UiMessage) {
        if self.ui.send(message).await.is_err() {
            debug!("UI receiver dropped, discarding message");
        }
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            state: self.session.state(),
            restart_requested: self.session.restart_requested(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use prost::Message;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    use crate::codec::ProtobufCodec;
    use crate::process::Unmanaged;
    use crate::protocol::messages::{
        from_client, from_server, FromClient, FromServer, InitializeResponse, Path,
    };
    use crate::protocol::FrameBuffer;

    async fn read_request(backend: &mut DuplexStream, frames: &mut FrameBuffer) -> FromClient {
        loop {
            if let Some(body) = frames.next_frame().unwrap() {
                return FromClient::decode(body).unwrap();
            }
            let mut buf = [0u8; 256];
            let n = backend.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed the connection");
            frames.extend(&buf[..n]);
        }
    }

    fn initialize_frame() -> Bytes {
        ProtobufCodec::encode_framed(&FromServer {
            sequence_number: 0,
            payload: Some(from_server::Payload::Initialize(InitializeResponse {
                server_project_root: "/proj".to_string(),
                entry_point: Some(Path::from_components(["train.py"])),
            })),
        })
        .unwrap()
    }

    async fn next_message(client: &mut Client) -> UiMessage {
        tokio::time::timeout(Duration::from_secs(2), client.next_ui_message())
            .await
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_builder_configuration() {
        let builder = Client::builder()
            .host("10.0.0.1")
            .port(7000)
            .max_frame_size(1024)
            .channel_capacity(0)
            .read_buffer_size(512);

        assert_eq!(builder.host, "10.0.0.1");
        assert_eq!(builder.port, 7000);
        assert_eq!(builder.max_frame_size, 1024);
        assert_eq!(builder.channel_capacity, 1);
        assert_eq!(builder.read_buffer_size, 512);
    }

    #[test]
    fn test_builder_default() {
        let builder = ClientBuilder::default();
        assert_eq!(builder.host, DEFAULT_HOST);
        assert_eq!(builder.port, DEFAULT_PORT);
        assert_eq!(builder.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
    }

    #[tokio::test]
    async fn test_handshake_then_analysis() {
        let (stream, mut backend) = duplex(4096);
        let mut client = Client::builder().attach(stream, Unmanaged);
        let mut frames = FrameBuffer::new();

        let handshake = read_request(&mut backend, &mut frames).await;
        assert_eq!(handshake.sequence_number, 0);
        assert!(matches!(
            handshake.payload,
            Some(from_client::Payload::Initialize(_))
        ));

        backend.write_all(&initialize_frame()).await.unwrap();
        match next_message(&mut client).await {
            UiMessage::Analysis(snapshot) => {
                assert_eq!(snapshot.project_root.as_deref(), Some("/proj"))
            }
            other => panic!("unexpected message: {:?}", other),
        }

        client.begin_analysis().await.unwrap();
        let analysis = read_request(&mut backend, &mut frames).await;
        assert_eq!(analysis.sequence_number, 1);
        assert!(matches!(
            analysis.payload,
            Some(from_client::Payload::Analysis(_))
        ));

        client.shutdown().await.unwrap();
        let summary = client.wait_for_shutdown().await.unwrap();
        assert_eq!(summary.state, SessionState::Closed);
        assert!(!summary.restart_requested);
    }

    #[tokio::test]
    async fn test_analysis_before_initialize_reports_error() {
        let (stream, _backend) = duplex(4096);
        let mut client = Client::builder().attach(stream, Unmanaged);

        client.begin_analysis().await.unwrap();

        assert_eq!(
            next_message(&mut client).await,
            UiMessage::Error {
                error_text: "Session is not initialized".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_restart_kills_once_per_command() {
        let (stream, _backend) = duplex(4096);
        let kills = Arc::new(AtomicUsize::new(0));
        let counter = kills.clone();
        let client = Client::builder().attach(stream, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        client.restart_profiling().await.unwrap();
        client.restart_profiling().await.unwrap();
        client.shutdown().await.unwrap();

        let summary = client.wait_for_shutdown().await.unwrap();
        assert!(summary.restart_requested);
        assert_eq!(kills.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_text_change_is_forwarded() {
        let (stream, _backend) = duplex(4096);
        let mut client = Client::builder().attach(stream, Unmanaged);

        client.notify_text_changed().await.unwrap();

        assert_eq!(next_message(&mut client).await, UiMessage::TextChange);
    }

    #[tokio::test]
    async fn test_peer_close_ends_session() {
        let (stream, backend) = duplex(4096);
        let mut client = Client::builder().attach(stream, Unmanaged);

        drop(backend);

        assert!(tokio::time::timeout(Duration::from_secs(2), client.next_ui_message())
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            client.begin_analysis().await,
            Err(SessionError::Closed)
        ));
        let summary = client.wait_for_shutdown().await.unwrap();
        assert_eq!(summary.state, SessionState::Closed);
    }
}
