//! Live model session module.
//!
//! This module defines the boundary to a hosted real-time model service and
//! its Gemini Live implementation.
//!
//! # Architecture
//!
//! - [`LiveClient`] opens sessions, [`LiveSession`] is one open session
//! - Each session delivers its inbound events to a single registered callback
//! - [`create_live_client`] builds the configured client at startup

mod base;
pub mod gemini;

use std::sync::Arc;

pub use base::{
    ActivityHandling, AutomaticActivityDetection, Blob, BoxedLiveSession, Content, EndSensitivity,
    FieldError, FunctionCall, GoAway, INPUT_AUDIO_MIME, LiveClient, LiveConnectConfig, LiveError,
    LiveResult, LiveServerMessage, LiveSession, Modality, OUTPUT_AUDIO_MIME_PREFIX, Part,
    RealtimeInput, RealtimeInputConfig, ServerContent, SessionEvent, SessionEventCallback,
    StartSensitivity, ToolCall, Transcription, TurnCoverage, UsageMetadata,
};
pub use gemini::{GEMINI_DEFAULT_MODEL, GeminiLiveClient, GeminiLiveConfig, GeminiLiveSession};

use crate::config::ServerConfig;

/// Create the live client described by the server configuration.
///
/// # Errors
///
/// Returns [`LiveError::AuthenticationFailed`] when no Gemini API key is
/// configured and [`LiveError::InvalidConfiguration`] for a malformed base URL.
pub fn create_live_client(config: &ServerConfig) -> LiveResult<Arc<dyn LiveClient>> {
    let api_key = config.gemini_api_key.as_deref().ok_or_else(|| {
        LiveError::AuthenticationFailed(
            "Gemini API key not configured in server environment".to_string(),
        )
    })?;

    let client = GeminiLiveClient::new(GeminiLiveConfig::new(
        api_key,
        config.gemini_base_url.as_deref(),
    ))?;
    Ok(Arc::new(client))
}
