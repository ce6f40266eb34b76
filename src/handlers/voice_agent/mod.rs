//! Voice agent WebSocket handler
//!
//! Connects a browser voice client to a Gemini Live session through a
//! per-connection [`Bridge`](crate::core::bridge::Bridge).
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **SETUP**: capture `system_prompt` / `user_prompt`; the first one creates
//!   the bridge and starts connecting
//! - **TEXT**: send `text` as a complete user turn
//! - **AUDIO_END**: the microphone stream ended
//! - **CLOSE**: close the session and the connection
//! - **Binary frames**: audio (PCM 16-bit, 16kHz, mono)
//!
//! Before the first SETUP every other frame is dropped.
//!
//! ## Server → Client
//!
//! - **session_established**, **setup_complete**, **setup_delivered**
//! - **transcript_in**, **transcript_out**, **text**, **inline_data**
//! - **function_call**, **turn_complete**, **go_away**, **usage**
//! - **error**: `{"where": <stage>, "message": ...}`
//! - **Binary frames**: model audio (PCM 16-bit, 24kHz, mono)

mod handler;

pub use handler::voice_agent_handler;
