//! Client control messages
//!
//! Subscribers send JSON text frames such as
//! `{"type":"on-screen","file_name":"abc.jpg"}` or `{"type":"off-screen"}`.
//! Problems are answered with `{"type":"error","message":"..."}`.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Wire form of a client control message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEvent {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Validated control signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSignal {
    /// An image is now visible
    OnScreen { file_name: String },
    /// Nothing is visible any more
    OffScreen,
}

impl ControlSignal {
    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let event: ClientEvent = serde_json::from_str(text)?;
        Self::try_from(event)
    }

    /// Wire form
    pub fn to_client_event(&self) -> ClientEvent {
        match self {
            ControlSignal::OnScreen { file_name } => ClientEvent {
                kind: "on-screen".to_string(),
                file_name: Some(file_name.clone()),
            },
            ControlSignal::OffScreen => ClientEvent {
                kind: "off-screen".to_string(),
                file_name: None,
            },
        }
    }
}

impl TryFrom<ClientEvent> for ControlSignal {
    type Error = ProtocolError;

    fn try_from(event: ClientEvent) -> Result<Self, Self::Error> {
        match event.kind.as_str() {
            "on-screen" => match event.file_name {
                Some(file_name) if !file_name.is_empty() => Ok(ControlSignal::OnScreen { file_name }),
                _ => Err(ProtocolError::MissingFileName),
            },
            "off-screen" => Ok(ControlSignal::OffScreen),
            _ => Err(ProtocolError::UnknownKind(event.kind)),
        }
    }
}

/// Error reply sent back to the subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl ErrorReply {
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self {
            kind: "error".to_string(),
            message: message.to_string(),
        }
    }

    /// Text frame payload
    pub fn to_json(&self) -> String {
        serde_json::json!({ "type": self.kind, "message": self.message }).to_string()
    }

    /// Whether a text frame looks like an error reply
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str::<ErrorReply>(text)
            .ok()
            .filter(|reply| reply.kind == "error")
    }
}
