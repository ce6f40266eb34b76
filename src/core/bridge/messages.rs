//! Voice agent WebSocket message types
//!
//! This module defines the caller-facing protocol: the inbound JSON envelope,
//! the closed set of outbound messages, and size validation.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum allowed size for each prompt (100 KB)
pub const MAX_PROMPT_SIZE: usize = 100 * 1024;

/// Maximum allowed size for text messages (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

/// Payload sent when an outbound message cannot be serialized.
pub const SERIALIZE_ERROR_FALLBACK: &str = r#"{"type":"error","message":"serialize error"}"#;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Inbound envelope from the caller.
///
/// ```json
/// {"type": "SETUP", "system_prompt": "You are helpful", "user_prompt": ""}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IncomingMessage {
    /// Message type; see [`IncomingType`]
    #[serde(rename = "type", default)]
    pub message_type: Option<String>,
    /// Text for `TEXT`
    #[serde(default)]
    pub text: Option<String>,
    /// System prompt for `SETUP`
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// User prompt for `SETUP`
    #[serde(default)]
    pub user_prompt: Option<String>,
}

/// Recognized inbound message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncomingType {
    /// Capture prompts; creates the bridge on first use
    Setup,
    /// A complete user text turn
    Text,
    /// The caller stopped streaming audio
    AudioEnd,
    /// Close the session and the connection
    Close,
}

impl IncomingType {
    /// Parse a type name, ignoring surrounding whitespace and case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SETUP" => Some(Self::Setup),
            "TEXT" => Some(Self::Text),
            "AUDIO_END" => Some(Self::AudioEnd),
            "CLOSE" => Some(Self::Close),
            _ => None,
        }
    }
}

impl IncomingMessage {
    /// Parse an inbound text frame.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw.trim())
    }

    /// The recognized type, if any.
    pub fn incoming_type(&self) -> Option<IncomingType> {
        self.message_type.as_deref().and_then(IncomingType::parse)
    }

    /// Validates field sizes to prevent resource exhaustion.
    pub fn validate_size(&self) -> Result<(), MessageValidationError> {
        for prompt in [&self.system_prompt, &self.user_prompt].into_iter().flatten() {
            let size = prompt.len();
            if size > MAX_PROMPT_SIZE {
                return Err(MessageValidationError::PromptTooLarge {
                    size,
                    max: MAX_PROMPT_SIZE,
                });
            }
        }
        if let Some(text) = &self.text {
            let size = text.len();
            if size > MAX_TEXT_SIZE {
                return Err(MessageValidationError::TextTooLarge {
                    size,
                    max: MAX_TEXT_SIZE,
                });
            }
        }
        Ok(())
    }
}

/// Error type for message validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageValidationError {
    #[error("Prompt too large: {size} bytes (max: {max} bytes)")]
    PromptTooLarge { size: usize, max: usize },
    #[error("Text too large: {size} bytes (max: {max} bytes)")]
    TextTooLarge { size: usize, max: usize },
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Operation named in an `error` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorStage {
    Connect,
    SendRealtimeInput,
    SendAudioStreamEnd,
    SendClientContent,
    OnSessionMessage,
    Receive,
}

/// Outbound message to the caller.
///
/// Only the fields of the active variant appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OutgoingMessage {
    /// The remote session is open
    SessionEstablished { session_id: String },

    /// The remote session acknowledged setup
    SetupComplete,

    /// Captured prompts were sent to the session
    SetupDelivered,

    /// Transcript of the caller's speech
    TranscriptIn { text: String },

    /// Transcript of the model's speech
    TranscriptOut { text: String },

    /// Model text part
    Text { text: String },

    /// Non-audio inline payload, base64 encoded
    InlineData { mime_type: String, data: String },

    /// Function call requested by the model; arguments are not forwarded
    FunctionCall { name: String },

    /// The model finished its turn
    TurnComplete,

    /// The remote session will disconnect; ISO 8601 duration or empty
    GoAway { time_left: String },

    /// Token accounting
    Usage {
        #[serde(skip_serializing_if = "Option::is_none")]
        prompt_token_count: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        response_token_count: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_token_count: Option<u32>,
    },

    /// A failed operation
    Error {
        #[serde(rename = "where")]
        stage: ErrorStage,
        message: String,
    },
}

impl OutgoingMessage {
    /// Build an error message.
    pub fn error(stage: ErrorStage, message: impl Into<String>) -> Self {
        Self::Error {
            stage,
            message: message.into(),
        }
    }

    /// Serialize to JSON, falling back to a fixed error payload.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize outgoing message");
            SERIALIZE_ERROR_FALLBACK.to_string()
        })
    }
}

// =============================================================================
// Message Routing
// =============================================================================

/// One unit of output for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRoute {
    /// JSON text message
    Outgoing(OutgoingMessage),
    /// Synthesized audio, sent as a binary frame
    Audio(Bytes),
}

impl From<OutgoingMessage> for MessageRoute {
    fn from(message: OutgoingMessage) -> Self {
        Self::Outgoing(message)
    }
}
