//! Per-connection bridge between a caller and one live session.
//!
//! # State machine
//!
//! ```text
//! Uninitialized --connect()--> Connecting --ok--> Active --close()--> Closed
//!                                  |                                    ^
//!                                  +--------------err-------------------+
//! ```
//!
//! Captured prompts are delivered exactly once, as soon as a session exists
//! and at least one prompt is non-empty, whichever of `set_prompts` and the
//! connect completion gets there first.
//!
//! Nothing here awaits a session call on the caller's frame path: sends are
//! queued to a per-bridge worker task, which preserves caller order and turns
//! failures into `error` messages.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::events::map_server_message;
use super::messages::{ErrorStage, MessageRoute, OutgoingMessage};
use super::registry::{ConnectionId, ConnectionRegistry};
use super::sender::FrontendSender;
use crate::core::live::{
    BoxedLiveSession, Content, LiveClient, LiveConnectConfig, LiveError, Part, RealtimeInput,
    SessionEvent,
};

/// Capacity of the per-bridge session command queue.
pub const SESSION_COMMAND_CAPACITY: usize = 256;

/// Close reason sent to the caller when connecting fails.
pub const CONNECT_FAILED_REASON: &str = "gemini connect failed";

/// Close reason sent to the caller when the remote session drops.
pub const SESSION_CLOSED_REASON: &str = "gemini session closed";

const MAX_ERROR_MESSAGE_CHARS: usize = 512;

/// Lifecycle state of a [`Bridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    Connecting,
    Active,
    Closed,
}

#[derive(Debug, Default)]
struct PendingPrompts {
    system: String,
    user: String,
}

impl PendingPrompts {
    fn is_empty(&self) -> bool {
        self.system.is_empty() && self.user.is_empty()
    }

    /// One user turn carrying every non-empty prompt, system prompt first.
    fn to_content(&self) -> Content {
        let parts = [&self.system, &self.user]
            .into_iter()
            .filter(|prompt| !prompt.is_empty())
            .map(|prompt| Part::from_text(prompt.as_str()))
            .collect();
        Content {
            role: "user".to_string(),
            parts,
        }
    }
}

struct Inner {
    state: BridgeState,
    prompts: PendingPrompts,
}

enum SessionCommand {
    Audio(Bytes),
    AudioEnd,
    Text(String),
    Prompts(Vec<Content>),
}

impl SessionCommand {
    fn stage(&self) -> ErrorStage {
        match self {
            SessionCommand::Audio(_) => ErrorStage::SendRealtimeInput,
            SessionCommand::AudioEnd => ErrorStage::SendAudioStreamEnd,
            SessionCommand::Text(_) | SessionCommand::Prompts(_) => ErrorStage::SendClientContent,
        }
    }
}

struct ActiveSession {
    session: BoxedLiveSession,
    commands: mpsc::Sender<SessionCommand>,
}

/// Mediates between one caller connection and one live session.
pub struct Bridge {
    id: ConnectionId,
    sender: FrontendSender,
    client: Arc<dyn LiveClient>,
    model: String,
    connect_config: LiveConnectConfig,
    registry: ConnectionRegistry,
    inner: Mutex<Inner>,
    session: OnceLock<ActiveSession>,
    prompts_delivered: AtomicBool,
    shutdown: CancellationToken,
}

impl Bridge {
    pub fn new(
        id: ConnectionId,
        sender: FrontendSender,
        client: Arc<dyn LiveClient>,
        model: impl Into<String>,
        connect_config: LiveConnectConfig,
        registry: ConnectionRegistry,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            sender,
            client,
            model: model.into(),
            connect_config,
            registry,
            inner: Mutex::new(Inner {
                state: BridgeState::Uninitialized,
                prompts: PendingPrompts::default(),
            }),
            session: OnceLock::new(),
            prompts_delivered: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> BridgeState {
        self.inner.lock().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == BridgeState::Closed
    }

    /// Remote session id, once connected.
    pub fn session_id(&self) -> Option<String> {
        self.session.get().map(|active| active.session.session_id())
    }

    /// Start connecting in the background. Only the first call has an effect.
    pub fn connect(self: &Arc<Self>) {
        {
            let mut inner = self.inner.lock();
            if inner.state != BridgeState::Uninitialized {
                tracing::debug!(connection_id = %self.id, state = ?inner.state, "Ignoring connect");
                return;
            }
            inner.state = BridgeState::Connecting;
        }

        tracing::info!(
            connection_id = %self.id,
            provider = self.client.provider(),
            model = %self.model,
            "Connecting live session"
        );

        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            match bridge
                .client
                .connect(&bridge.model, &bridge.connect_config)
                .await
            {
                Ok(session) => bridge.on_connected(session),
                Err(e) => bridge.on_connect_failed(e),
            }
        });
    }

    fn on_connected(self: &Arc<Self>, session: BoxedLiveSession) {
        let session_id = session.session_id();
        let (tx, rx) = mpsc::channel(SESSION_COMMAND_CAPACITY);

        {
            let mut inner = self.inner.lock();
            if inner.state == BridgeState::Closed {
                drop(inner);
                tracing::info!(
                    connection_id = %self.id,
                    session_id = %session_id,
                    "Bridge closed while connecting, closing new session"
                );
                spawn_session_close(self.id, session);
                return;
            }

            tokio::spawn(run_worker(
                self.id,
                Arc::clone(&session),
                rx,
                self.sender.clone(),
                self.shutdown.clone(),
            ));

            self.emit(OutgoingMessage::SessionEstablished {
                session_id: session_id.clone(),
            });

            inner.state = BridgeState::Active;
            let active = self.session.get_or_init(|| ActiveSession {
                session: Arc::clone(&session),
                commands: tx,
            });
            self.try_deliver_prompts(&inner.prompts, active);
        }

        tracing::info!(connection_id = %self.id, session_id = %session_id, "Live session established");

        let weak: Weak<Bridge> = Arc::downgrade(self);
        let registered = session.receive(Arc::new(move |event| {
            if let Some(bridge) = weak.upgrade() {
                bridge.on_session_event(event);
            }
        }));
        if let Err(e) = registered {
            tracing::error!(connection_id = %self.id, error = %e, "Failed to register session callback");
            self.emit_error(ErrorStage::Receive, &e);
        }
    }

    fn on_connect_failed(self: &Arc<Self>, error: LiveError) {
        tracing::error!(connection_id = %self.id, error = %error, "Live session connect failed");
        if self.is_closed() {
            return;
        }
        self.emit_error(ErrorStage::Connect, &error);
        self.sender.close(CONNECT_FAILED_REASON);
        self.close();
    }

    /// Overwrite the captured prompts; `None` is stored as empty.
    ///
    /// Delivers them immediately when a session already exists and nothing
    /// was delivered yet.
    pub fn set_prompts(&self, system_prompt: Option<String>, user_prompt: Option<String>) {
        let mut inner = self.inner.lock();
        if inner.state == BridgeState::Closed {
            tracing::debug!(connection_id = %self.id, "Ignoring prompts for closed bridge");
            return;
        }
        inner.prompts = PendingPrompts {
            system: system_prompt.unwrap_or_default(),
            user: user_prompt.unwrap_or_default(),
        };
        if let Some(active) = self.session.get() {
            self.try_deliver_prompts(&inner.prompts, active);
        }
    }

    /// Called with the bridge lock held.
    fn try_deliver_prompts(&self, prompts: &PendingPrompts, active: &ActiveSession) {
        if prompts.is_empty() {
            return;
        }
        if self
            .prompts_delivered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        tracing::debug!(connection_id = %self.id, "Delivering captured prompts");
        self.enqueue(active, SessionCommand::Prompts(vec![prompts.to_content()]));
    }

    /// Forward raw 16kHz PCM audio. Dropped when no session exists.
    pub fn send_audio(&self, audio: Bytes) {
        self.dispatch(SessionCommand::Audio(audio));
    }

    /// Send a complete user text turn. Dropped when no session exists.
    pub fn send_text(&self, text: String) {
        self.dispatch(SessionCommand::Text(text));
    }

    /// Signal the end of the caller's audio stream. Dropped when no session exists.
    pub fn send_audio_end(&self) {
        self.dispatch(SessionCommand::AudioEnd);
    }

    fn dispatch(&self, command: SessionCommand) {
        if self.is_closed() {
            return;
        }
        match self.session.get() {
            Some(active) => self.enqueue(active, command),
            None => {
                tracing::trace!(connection_id = %self.id, "No session yet, dropping input");
            }
        }
    }

    fn enqueue(&self, active: &ActiveSession, command: SessionCommand) {
        match active.commands.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                let stage = command.stage();
                tracing::warn!(connection_id = %self.id, ?stage, "Session command queue full");
                self.emit(OutgoingMessage::error(stage, "session send queue full"));
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!(connection_id = %self.id, "Session worker stopped, dropping input");
            }
        }
    }

    /// Close the bridge. Idempotent.
    ///
    /// Closes the session in the background (failures are discarded), stops
    /// the worker and removes the bridge from the registry.
    pub fn close(&self) -> bool {
        let session = {
            let mut inner = self.inner.lock();
            if inner.state == BridgeState::Closed {
                return false;
            }
            inner.state = BridgeState::Closed;
            self.session.get().map(|active| Arc::clone(&active.session))
        };

        self.shutdown.cancel();
        if let Some(session) = session {
            spawn_session_close(self.id, session);
        }
        self.registry.remove_bridge(self);

        tracing::info!(connection_id = %self.id, "Bridge closed");
        true
    }

    fn on_session_event(&self, event: SessionEvent) {
        if self.is_closed() {
            return;
        }
        match event {
            SessionEvent::Message(message) => {
                match catch_unwind(AssertUnwindSafe(|| map_server_message(&message))) {
                    Ok(routes) => {
                        for route in routes {
                            self.route(route);
                        }
                    }
                    Err(panic) => {
                        let detail = panic_message(panic.as_ref());
                        tracing::error!(connection_id = %self.id, error = %detail, "Failed to map session message");
                        self.emit(OutgoingMessage::error(
                            ErrorStage::OnSessionMessage,
                            sanitize_error_message(&detail),
                        ));
                    }
                }
            }
            SessionEvent::Closed { reason } => {
                tracing::info!(connection_id = %self.id, ?reason, "Live session ended");
                if let Some(reason) = reason {
                    self.emit(OutgoingMessage::error(
                        ErrorStage::Receive,
                        sanitize_error_message(&reason),
                    ));
                }
                self.sender.close(SESSION_CLOSED_REASON);
                self.close();
            }
        }
    }

    fn route(&self, route: MessageRoute) {
        match route {
            MessageRoute::Outgoing(message) => self.emit(message),
            MessageRoute::Audio(audio) => self.sender.send_binary(audio),
        }
    }

    fn emit(&self, message: OutgoingMessage) {
        self.sender.send_text(message.to_json());
    }

    fn emit_error(&self, stage: ErrorStage, error: &LiveError) {
        self.emit(OutgoingMessage::error(
            stage,
            sanitize_error_message(&error.detail()),
        ));
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_worker(
    id: ConnectionId,
    session: BoxedLiveSession,
    mut commands: mpsc::Receiver<SessionCommand>,
    sender: FrontendSender,
    shutdown: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            _ = shutdown.cancelled() => break,
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let stage = command.stage();
        let delivered_prompts = matches!(command, SessionCommand::Prompts(_));
        let result = match command {
            SessionCommand::Audio(audio) => {
                session
                    .send_realtime_input(RealtimeInput::Audio(audio))
                    .await
            }
            SessionCommand::AudioEnd => {
                session
                    .send_realtime_input(RealtimeInput::AudioStreamEnd)
                    .await
            }
            SessionCommand::Text(text) => {
                session
                    .send_client_content(vec![Content::user_text(text)], true)
                    .await
            }
            SessionCommand::Prompts(turns) => session.send_client_content(turns, false).await,
        };

        match result {
            Ok(()) if delivered_prompts => {
                sender.send_text(OutgoingMessage::SetupDelivered.to_json());
            }
            Ok(()) => {}
            Err(e) => {
                tracing::warn!(connection_id = %id, ?stage, error = %e, "Session send failed");
                sender.send_text(
                    OutgoingMessage::error(stage, sanitize_error_message(&e.detail())).to_json(),
                );
            }
        }
    }
    tracing::debug!(connection_id = %id, "Session worker stopped");
}

fn spawn_session_close(id: ConnectionId, session: BoxedLiveSession) {
    tokio::spawn(async move {
        if let Err(e) = session.close().await {
            tracing::debug!(connection_id = %id, error = %e, "Ignoring session close failure");
        }
    });
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic while mapping session message".to_string()
    }
}

/// Make an error description safe to show the caller.
///
/// Drops carriage returns, folds newlines into spaces, masks `key=` query
/// values and caps the length.
pub fn sanitize_error_message(message: &str) -> String {
    let flat: String = message
        .chars()
        .filter(|&c| c != '\r')
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();

    let mut masked = String::with_capacity(flat.len());
    let mut rest = flat.as_str();
    while let Some(pos) = rest.find("key=") {
        let (head, tail) = rest.split_at(pos + "key=".len());
        masked.push_str(head);
        let end = tail
            .find(|c: char| c == '&' || c == '"' || c.is_whitespace())
            .unwrap_or(tail.len());
        if end > 0 {
            masked.push_str("***");
        }
        rest = &tail[end..];
    }
    masked.push_str(rest);

    if masked.chars().count() > MAX_ERROR_MESSAGE_CHARS {
        masked.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
    } else {
        masked
    }
}
