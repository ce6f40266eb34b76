//! Voice agent WebSocket handler
//!
//! One socket, one bridge. The bridge is created lazily on the first SETUP
//! message and torn down with the socket.

use axum::{
    Extension,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::Response,
};
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::time::error::Elapsed;
use tokio::time::{Duration, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::bridge::{
    Bridge, ConnectionId, FRONTEND_CHANNEL_CAPACITY, FrontendFrame, FrontendSender,
    IncomingMessage, IncomingType, frontend_channel,
};
use crate::middleware::ClientIp;
use crate::state::AppState;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// How long teardown waits for queued frames to be written
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const CLIENT_CLOSE_REASON: &str = "client requested close";
const IDLE_CLOSE_REASON: &str = "idle timeout";
const TEARDOWN_CLOSE_REASON: &str = "connection closed";
const SHUTDOWN_CLOSE_REASON: &str = "server shutting down";

/// Connection-limit slot held for the lifetime of the socket.
///
/// Released on drop, including when the upgrade never completes.
struct ConnectionSlot {
    state: Arc<AppState>,
    ip: IpAddr,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.state.release_connection(self.ip);
    }
}

/// Voice agent WebSocket handler
///
/// Upgrades `GET /api/v1/voice/agent` and hands the socket to a new
/// connection loop.
pub async fn voice_agent_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let slot = client_ip.map(|Extension(ClientIp(ip))| ConnectionSlot {
        state: state.clone(),
        ip,
    });
    debug!("Voice agent WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_voice_agent_socket(socket, state, slot))
}

async fn handle_voice_agent_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    slot: Option<ConnectionSlot>,
) {
    let connection_id = ConnectionId::new();
    info!(connection_id = %connection_id, "Voice agent WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (frontend, mut frames) = frontend_channel(FRONTEND_CHANNEL_CAPACITY);
    let close_requested = frames.close_requested();
    let socket_closed = CancellationToken::new();
    let idle_timeout = state.config.ws_idle_timeout();

    let sender_closed = socket_closed.clone();
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            let closing = matches!(frame, FrontendFrame::Close(_));
            let message = match frame {
                FrontendFrame::Text(json) => Message::Text(json.into()),
                FrontendFrame::Binary(bytes) => Message::Binary(bytes),
                FrontendFrame::Close(reason) => {
                    debug!(connection_id = %connection_id, reason = %reason, "Closing WebSocket");
                    Message::Close(Some(CloseFrame {
                        code: close_code::NORMAL,
                        reason: reason.into(),
                    }))
                }
            };

            if let Err(e) = ws_sender.send(message).await {
                debug!(connection_id = %connection_id, error = %e, "Failed to write WebSocket frame");
                break;
            }
            if closing {
                break;
            }
        }
        sender_closed.cancel();
    });

    let mut bridge: Option<Arc<Bridge>> = None;

    loop {
        tokio::select! {
            _ = socket_closed.cancelled() => break,
            _ = close_requested.cancelled() => {
                debug!(connection_id = %connection_id, "Close requested, ending connection");
                break;
            }
            _ = state.shutdown.cancelled() => {
                info!(connection_id = %connection_id, "Server shutting down, closing connection");
                frontend.close(SHUTDOWN_CLOSE_REASON);
                break;
            }
            next = next_inbound(&mut ws_receiver, idle_timeout) => match next {
                Ok(Some(Ok(msg))) => {
                    if !process_message(msg, connection_id, &mut bridge, &frontend, &state) {
                        break;
                    }
                }
                Ok(Some(Err(e))) => {
                    warn!(connection_id = %connection_id, error = %e, "Voice agent WebSocket error");
                    break;
                }
                Ok(None) => {
                    info!(connection_id = %connection_id, "Voice agent WebSocket closed by client");
                    break;
                }
                Err(_) => {
                    warn!(
                        connection_id = %connection_id,
                        idle_timeout = ?idle_timeout,
                        "Voice agent WebSocket idle, closing"
                    );
                    frontend.close(IDLE_CLOSE_REASON);
                    break;
                }
            }
        }
    }

    // Cleanup
    state.bridges.close(&connection_id);
    drop(bridge);

    frontend.close(TEARDOWN_CLOSE_REASON);
    drop(frontend);
    let abort = sender_task.abort_handle();
    if timeout(SENDER_DRAIN_TIMEOUT, sender_task).await.is_err() {
        abort.abort();
    }

    drop(slot);
    info!(connection_id = %connection_id, "Voice agent WebSocket connection terminated");
}

/// Next inbound frame, or `Err` once `idle_timeout` elapses without one.
async fn next_inbound(
    receiver: &mut SplitStream<WebSocket>,
    idle_timeout: Option<Duration>,
) -> Result<Option<Result<Message, axum::Error>>, Elapsed> {
    match idle_timeout {
        Some(limit) => timeout(limit, receiver.next()).await,
        None => Ok(receiver.next().await),
    }
}

/// Handle one inbound frame. Returns `false` when the connection should end.
fn process_message(
    msg: Message,
    connection_id: ConnectionId,
    bridge: &mut Option<Arc<Bridge>>,
    frontend: &FrontendSender,
    state: &Arc<AppState>,
) -> bool {
    match msg {
        Message::Text(text) => {
            let incoming = match IncomingMessage::parse(&text) {
                Ok(incoming) => incoming,
                Err(e) => {
                    debug!(connection_id = %connection_id, error = %e, "Ignoring unparseable message");
                    return true;
                }
            };

            if let Err(e) = incoming.validate_size() {
                warn!(connection_id = %connection_id, error = %e, "Dropping oversized message");
                return true;
            }

            handle_incoming(incoming, connection_id, bridge, frontend, state)
        }
        Message::Binary(data) => {
            match bridge {
                Some(bridge) => bridge.send_audio(data),
                None => debug!(connection_id = %connection_id, "No bridge yet, dropping audio"),
            }
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!(connection_id = %connection_id, "Voice agent WebSocket close received");
            false
        }
    }
}

fn handle_incoming(
    incoming: IncomingMessage,
    connection_id: ConnectionId,
    bridge: &mut Option<Arc<Bridge>>,
    frontend: &FrontendSender,
    state: &Arc<AppState>,
) -> bool {
    let Some(kind) = incoming.incoming_type() else {
        debug!(
            connection_id = %connection_id,
            message_type = ?incoming.message_type,
            "Ignoring message with unrecognized type"
        );
        return true;
    };

    let Some(active) = bridge.as_ref() else {
        if kind == IncomingType::Setup {
            *bridge = Some(start_bridge(incoming, connection_id, frontend, state));
        } else {
            debug!(connection_id = %connection_id, ?kind, "No bridge yet, dropping message");
        }
        return true;
    };

    match kind {
        IncomingType::Setup => active.set_prompts(incoming.system_prompt, incoming.user_prompt),
        IncomingType::Text => active.send_text(incoming.text.unwrap_or_default()),
        IncomingType::AudioEnd => active.send_audio_end(),
        IncomingType::Close => {
            info!(connection_id = %connection_id, "Client requested close");
            state.bridges.close(&connection_id);
            frontend.close(CLIENT_CLOSE_REASON);
            return false;
        }
    }
    true
}

fn start_bridge(
    setup: IncomingMessage,
    connection_id: ConnectionId,
    frontend: &FrontendSender,
    state: &Arc<AppState>,
) -> Arc<Bridge> {
    let bridge = Bridge::new(
        connection_id,
        frontend.clone(),
        state.live_client.clone(),
        state.config.gemini_model.clone(),
        state.live_connect_config().clone(),
        state.bridges.clone(),
    );
    bridge.set_prompts(setup.system_prompt, setup.user_prompt);
    if !state.bridges.insert_if_absent(bridge.clone()) {
        warn!(connection_id = %connection_id, "Bridge already registered for connection");
    }
    bridge.connect();
    bridge
}
