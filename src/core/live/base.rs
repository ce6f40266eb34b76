//! Base traits and types for live (bidirectional streaming) model sessions.
//!
//! This module defines the provider-neutral boundary between the bridge and a
//! hosted real-time model service. A [`LiveClient`] opens sessions; a
//! [`LiveSession`] accepts realtime audio and content turns and delivers every
//! inbound server event to a single registered callback.
//!
//! # Audio Format
//!
//! Input audio is PCM 16-bit signed little-endian, 16kHz, mono.
//! Output audio is PCM 16-bit (24kHz on Gemini Live) tagged `audio/pcm...`.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Mime type of the audio the caller streams in.
pub const INPUT_AUDIO_MIME: &str = "audio/pcm;rate=16000";

/// Prefix every synthesized audio part carries.
pub const OUTPUT_AUDIO_MIME_PREFIX: &str = "audio/pcm";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to a live model session.
#[derive(Debug, Error)]
pub enum LiveError {
    /// Connection to the model service failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The server sent something that does not follow the protocol
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// `receive` was called more than once on the same session
    #[error("Receive callback already registered")]
    AlreadyReceiving,
}

impl LiveError {
    /// The bare description without the variant prefix.
    ///
    /// This is what callers see in `error` messages, e.g. a connect failure
    /// carrying "quota exceeded" is reported as exactly "quota exceeded".
    pub fn detail(&self) -> String {
        match self {
            LiveError::ConnectionFailed(msg)
            | LiveError::AuthenticationFailed(msg)
            | LiveError::InvalidConfiguration(msg)
            | LiveError::WebSocketError(msg)
            | LiveError::SerializationError(msg)
            | LiveError::ProtocolError(msg) => msg.clone(),
            LiveError::NotConnected | LiveError::AlreadyReceiving => self.to_string(),
        }
    }
}

/// Result type for live session operations.
pub type LiveResult<T> = Result<T, LiveError>;

// =============================================================================
// Connect Configuration
// =============================================================================

/// Response modality requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    Text,
    Audio,
}

/// How eagerly the server VAD declares start of speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StartSensitivity {
    #[serde(rename = "START_SENSITIVITY_HIGH")]
    #[default]
    High,
    #[serde(rename = "START_SENSITIVITY_LOW")]
    Low,
}

/// How eagerly the server VAD declares end of speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndSensitivity {
    #[serde(rename = "END_SENSITIVITY_HIGH")]
    High,
    #[serde(rename = "END_SENSITIVITY_LOW")]
    #[default]
    Low,
}

/// What happens to the model turn when the caller starts speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityHandling {
    /// Any detected speech start interrupts the current model turn
    #[default]
    StartOfActivityInterrupts,
    NoInterruption,
}

/// Which input audio counts towards a user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnCoverage {
    #[default]
    TurnIncludesOnlyActivity,
    TurnIncludesAllInput,
}

/// Server-side voice activity detection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomaticActivityDetection {
    pub disabled: bool,
    pub start_of_speech_sensitivity: StartSensitivity,
    pub end_of_speech_sensitivity: EndSensitivity,
    /// Audio kept before a detected speech start (ms)
    pub prefix_padding_ms: u32,
    /// Silence required before end of speech is declared (ms)
    pub silence_duration_ms: u32,
}

impl Default for AutomaticActivityDetection {
    fn default() -> Self {
        Self {
            disabled: false,
            start_of_speech_sensitivity: StartSensitivity::High,
            end_of_speech_sensitivity: EndSensitivity::Low,
            prefix_padding_ms: 100,
            silence_duration_ms: 500,
        }
    }
}

/// Realtime input handling for the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealtimeInputConfig {
    pub automatic_activity_detection: AutomaticActivityDetection,
    pub activity_handling: ActivityHandling,
    pub turn_coverage: TurnCoverage,
}

/// Configuration fixed at connect time.
///
/// Nothing here is negotiable by the caller; the server builds it once from
/// its own configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveConnectConfig {
    pub response_modalities: Vec<Modality>,
    /// Prebuilt voice used for synthesized audio
    pub voice_name: Option<String>,
    /// Thinking token budget; `Some(0)` disables thinking
    pub thinking_budget: Option<i32>,
    pub realtime_input: RealtimeInputConfig,
    pub input_audio_transcription: bool,
    pub output_audio_transcription: bool,
}

impl Default for LiveConnectConfig {
    fn default() -> Self {
        Self {
            response_modalities: vec![Modality::Audio],
            voice_name: Some("Puck".to_string()),
            thinking_budget: Some(0),
            realtime_input: RealtimeInputConfig::default(),
            input_audio_transcription: true,
            output_audio_transcription: true,
        }
    }
}

// =============================================================================
// Session Input
// =============================================================================

/// Realtime input pushed into a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeInput {
    /// Raw 16kHz mono PCM16 audio
    Audio(Bytes),
    /// The caller stopped streaming audio
    AudioStreamEnd,
}

/// Inline binary payload tagged with a media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub mime_type: Option<String>,
    pub data: Option<Bytes>,
}

/// Function call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub id: Option<String>,
    pub name: Option<String>,
    pub args: Option<serde_json::Value>,
}

/// One part of a content turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Part {
    pub text: Option<String>,
    pub inline_data: Option<Blob>,
    pub function_call: Option<FunctionCall>,
}

impl Part {
    /// A plain text part.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// A content turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    /// A user turn made of a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::from_text(text)],
        }
    }
}

// =============================================================================
// Server Events
// =============================================================================

/// A transcription fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcription {
    pub text: Option<String>,
}

/// Streamed server content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerContent {
    pub input_transcription: Option<Transcription>,
    pub output_transcription: Option<Transcription>,
    /// Parts of the model turn, in source order
    pub model_turn: Option<Vec<Part>>,
    pub turn_complete: Option<bool>,
    pub interrupted: Option<bool>,
}

/// Top-level tool call request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCall {
    pub function_calls: Vec<FunctionCall>,
}

/// Notice that the server is about to disconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoAway {
    pub time_left: Option<Duration>,
}

/// Token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u32>,
    pub response_token_count: Option<u32>,
    pub total_token_count: Option<u32>,
}

/// A substructure of a server event that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// JSON path of the offending field, e.g. `serverContent.modelTurn.parts[1]`
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// One decoded server event.
///
/// Every field is optional and independent: several may be populated by the
/// same event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveServerMessage {
    pub setup_complete: bool,
    pub server_content: Option<ServerContent>,
    pub tool_call: Option<ToolCall>,
    pub go_away: Option<GoAway>,
    pub usage_metadata: Option<UsageMetadata>,
    pub field_errors: Vec<FieldError>,
}

/// Event delivered to the registered session callback.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A server event
    Message(LiveServerMessage),
    /// The remote session ended. `reason` is set when it ended on an error.
    Closed { reason: Option<String> },
}

/// Callback invoked for every session event.
///
/// Runs on the session's reader task, never on the caller's frame handler.
pub type SessionEventCallback = Arc<dyn Fn(SessionEvent) + Send + Sync>;

// =============================================================================
// Base Traits
// =============================================================================

/// An open live session.
#[async_trait]
pub trait LiveSession: Send + Sync {
    /// Identifier of the remote session.
    fn session_id(&self) -> String;

    /// Push realtime input (audio or end-of-stream).
    async fn send_realtime_input(&self, input: RealtimeInput) -> LiveResult<()>;

    /// Push content turns.
    async fn send_client_content(&self, turns: Vec<Content>, turn_complete: bool)
    -> LiveResult<()>;

    /// Register the event callback. May be called exactly once per session.
    fn receive(&self, callback: SessionEventCallback) -> LiveResult<()>;

    /// Close the session.
    async fn close(&self) -> LiveResult<()>;
}

/// Shared handle to an open session.
pub type BoxedLiveSession = Arc<dyn LiveSession>;

/// Opens live sessions.
#[async_trait]
pub trait LiveClient: Send + Sync {
    /// Connect to `model` with the given configuration.
    async fn connect(&self, model: &str, config: &LiveConnectConfig)
    -> LiveResult<BoxedLiveSession>;

    /// Provider name for logging.
    fn provider(&self) -> &'static str;
}
