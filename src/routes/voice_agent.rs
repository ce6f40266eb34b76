//! Voice agent WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::voice_agent_handler;
use crate::state::AppState;
use std::sync::Arc;

/// WebSocket endpoint path
pub const VOICE_AGENT_PATH: &str = "/api/v1/voice/agent";

/// Create the voice agent WebSocket router
///
/// # Endpoint
///
/// `GET /api/v1/voice/agent` - WebSocket upgrade
///
/// # Example
///
/// ```json
/// // Client sends setup; the server starts a Gemini Live session
/// {"type": "SETUP", "system_prompt": "You are helpful", "user_prompt": ""}
///
/// // Server responds
/// {"type": "session_established", "sessionId": "..."}
/// {"type": "setup_delivered"}
/// {"type": "setup_complete"}
///
/// // Client streams 16kHz PCM as binary frames, server streams 24kHz PCM back
/// ```
pub fn create_voice_agent_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(VOICE_AGENT_PATH, get(voice_agent_handler))
        .layer(TraceLayer::new_for_http())
}
