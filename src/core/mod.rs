pub mod bridge;
pub mod live;

// Re-export commonly used types for convenience
pub use bridge::{
    Bridge, BridgeState, ConnectionId, ConnectionRegistry, FrontendFrame, FrontendSender,
    IncomingMessage, IncomingType, OutgoingMessage,
};

pub use live::{
    BoxedLiveSession, GeminiLiveClient, GeminiLiveConfig, LiveClient, LiveConnectConfig,
    LiveError, LiveResult, LiveSession, SessionEvent, create_live_client,
};
