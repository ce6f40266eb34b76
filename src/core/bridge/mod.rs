//! Voice agent bridge.
//!
//! One [`Bridge`] per caller connection. It owns the caller's prompts, the
//! remote live session and the translation of session messages into the
//! caller-facing JSON protocol. Bridges are looked up through the
//! process-wide [`ConnectionRegistry`].

#[allow(clippy::module_inception)]
mod bridge;
pub mod events;
pub mod messages;
mod registry;
mod sender;

pub use bridge::{
    Bridge, BridgeState, CONNECT_FAILED_REASON, SESSION_CLOSED_REASON, SESSION_COMMAND_CAPACITY,
    sanitize_error_message,
};
pub use events::{format_iso_duration, map_server_message};
pub use messages::{
    ErrorStage, IncomingMessage, IncomingType, MAX_PROMPT_SIZE, MAX_TEXT_SIZE, MessageRoute,
    MessageValidationError, OutgoingMessage,
};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use sender::{
    FRONTEND_BACKLOG_REASON, FRONTEND_CHANNEL_CAPACITY, FrontendFrame, FrontendReceiver,
    FrontendSender, frontend_channel,
};
