//! Session demo - drives a profiler backend from the terminal.
//!
//! This example demonstrates:
//! - Connecting with `Client::builder()`
//! - Printing every UI message as a JSON line
//! - Feeding UI commands from stdin (`{"command": "begin_analysis_clicked"}`)
//!
//! # Running
//!
//! Start the profiler backend on port 60120, then:
//!
//! ```sh
//! RUST_LOG=skyline_session=debug cargo run --example session -- localhost 60120
//! ```
//!
//! An analysis is requested automatically once the backend has answered
//! the handshake.

use skyline_session::{Client, Command, UiMessage, Unmanaged};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port = match args.next() {
        Some(port) => port.parse()?,
        None => skyline_session::transport::DEFAULT_PORT,
    };

    let mut client = Client::builder().host(host).port(port).connect(Unmanaged).await?;

    // Forward stdin lines as UI commands.
    let commands = client.command_sender();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match Command::from_ui_json(&line) {
                Ok(Some(command)) => {
                    if commands.send(command).await.is_err() {
                        break;
                    }
                }
                Ok(None) => eprintln!("unknown command: {}", line),
                Err(e) => eprintln!("invalid command: {}", e),
            }
        }
    });

    let mut requested = false;
    while let Some(message) = client.next_ui_message().await {
        println!("{}", message.to_json()?);

        if let UiMessage::Analysis(snapshot) = &message {
            if !requested && snapshot.project_root.is_some() {
                requested = true;
                client.begin_analysis().await?;
            }
        }
    }

    let summary = client.wait_for_shutdown().await?;
    eprintln!(
        "session ended: state={:?} restart_requested={}",
        summary.state, summary.restart_requested
    );
    Ok(())
}
