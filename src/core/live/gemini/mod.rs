//! Gemini Live API module.
//!
//! Bidirectional audio streaming against Gemini's `BidiGenerateContent`
//! WebSocket endpoint.
//!
//! # Features
//!
//! - 16kHz PCM input, 24kHz PCM output
//! - Server-side voice activity detection with barge-in
//! - Input and output transcription
//! - Function call requests
//!
//! # Example
//!
//! ```rust,ignore
//! use voice_agent_gateway::core::live::{GeminiLiveClient, GeminiLiveConfig, LiveClient, LiveConnectConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = GeminiLiveClient::new(GeminiLiveConfig::new("api-key", None)).unwrap();
//!     let session = client
//!         .connect("gemini-2.5-flash-native-audio-preview-12-2025", &LiveConnectConfig::default())
//!         .await
//!         .unwrap();
//!
//!     session.receive(Arc::new(|event| println!("{event:?}"))).unwrap();
//! }
//! ```

mod client;
mod config;
mod messages;

pub use client::{GeminiLiveClient, GeminiLiveSession};
pub use config::{
    GEMINI_DEFAULT_BASE_URL, GEMINI_DEFAULT_MODEL, GEMINI_LIVE_PATH, GEMINI_OUTPUT_SAMPLE_RATE,
    GeminiLiveConfig, normalize_model, parse_proto_duration,
};
pub use messages::{ClientMessage, decode_server_message};
