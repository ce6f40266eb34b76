//! Gemini Live API configuration.
//!
//! This module contains the connection settings for Gemini Live:
//! - Endpoint and URL construction
//! - Model name normalization
//! - Protobuf duration parsing for `goAway.timeLeft`

use std::time::Duration;

use zeroize::Zeroize;

use crate::core::live::base::{LiveError, LiveResult};

/// Default Gemini API host.
pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Path of the bidirectional streaming endpoint.
pub const GEMINI_LIVE_PATH: &str =
    "/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default native-audio model.
pub const GEMINI_DEFAULT_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-12-2025";

/// Sample rate of synthesized audio returned by Gemini Live.
pub const GEMINI_OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Connection settings for [`GeminiLiveClient`](super::GeminiLiveClient).
#[derive(Clone)]
pub struct GeminiLiveConfig {
    /// API key sent as the `key` query parameter
    pub api_key: String,
    /// Base URL (`https://...`, `http://...`, `wss://...` or `ws://...`)
    pub base_url: String,
}

impl std::fmt::Debug for GeminiLiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiLiveConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Drop for GeminiLiveConfig {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

impl GeminiLiveConfig {
    /// Create a config, falling back to the public endpoint when `base_url` is empty.
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        let base_url = base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(GEMINI_DEFAULT_BASE_URL)
            .to_string();
        Self {
            api_key: api_key.into(),
            base_url,
        }
    }

    /// Build the WebSocket URL for the streaming endpoint.
    ///
    /// HTTP schemes are mapped to their WebSocket counterparts.
    pub fn ws_url(&self) -> LiveResult<url::Url> {
        let base = self.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };

        let mut url = url::Url::parse(&format!("{base}{GEMINI_LIVE_PATH}"))
            .map_err(|e| LiveError::InvalidConfiguration(format!("invalid base URL: {e}")))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(LiveError::InvalidConfiguration(format!(
                    "unsupported URL scheme: {other}"
                )));
            }
        }

        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

/// Normalize a model id to the `models/...` resource form.
pub fn normalize_model(model: &str) -> String {
    let model = model.trim();
    if model.is_empty() {
        GEMINI_DEFAULT_MODEL.to_string()
    } else if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

/// Parse a protobuf JSON duration such as `"30s"` or `"1.500s"`.
pub fn parse_proto_duration(value: &str) -> Option<Duration> {
    let seconds = value.trim().strip_suffix('s')?;
    let secs: f64 = seconds.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(secs))
}
