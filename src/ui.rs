//! Messages exchanged with the UI.
//!
//! Outbound [`UiMessage`]s are JSON objects tagged by `message_type`.
//! Inbound commands arrive as `{"command": "<name>"}` and are parsed into
//! [`Command`].

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::location_index::LocationIndex;
use crate::snapshot::Snapshot;

/// Message posted to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum UiMessage {
    /// Current analysis snapshot, fields flattened next to the tag.
    Analysis(Snapshot),
    /// A document was edited; the UI should mark results as stale.
    TextChange,
    /// Session or protocol error.
    Error { error_text: String },
    /// Source overlays built from the latest breakdown.
    Highlights { files: LocationIndex },
}

impl UiMessage {
    /// Serialize to a single JSON line (no trailing newline).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Value of the `message_type` tag.
    pub fn message_type(&self) -> &'static str {
        match self {
            UiMessage::Analysis(_) => "analysis",
            UiMessage::TextChange => "text_change",
            UiMessage::Error { .. } => "error",
            UiMessage::Highlights { .. } => "highlights",
        }
    }
}

/// Command sent to the session event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Ask the backend for a new analysis.
    BeginAnalysis,
    /// Flag a restart and hard-kill the backend.
    RestartProfiling,
    /// A document changed; forwarded to the UI as-is.
    TextChanged,
    /// Close the connection and stop the loop.
    Shutdown,
}

#[derive(Deserialize)]
struct CommandMessage {
    command: String,
}

impl Command {
    /// Map a UI button name to a command.
    pub fn from_ui_name(name: &str) -> Option<Self> {
        match name {
            "begin_analysis_clicked" => Some(Command::BeginAnalysis),
            "restart_profiling_clicked" => Some(Command::RestartProfiling),
            _ => None,
        }
    }

    /// Parse a `{"command": "..."}` message from the UI.
    ///
    /// Returns `Ok(None)` for well-formed messages naming an unknown command.
    pub fn from_ui_json(json: &str) -> Result<Option<Self>> {
        let message: CommandMessage = serde_json::from_str(json)?;
        Ok(Self::from_ui_name(&message.command))
    }
}
