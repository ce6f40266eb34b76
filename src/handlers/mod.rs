//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `voice_agent` - Voice agent WebSocket bridged to Gemini Live

pub mod api;
pub mod voice_agent;

pub use voice_agent::voice_agent_handler;
