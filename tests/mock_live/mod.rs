//! Scripted in-process live client
//!
//! Stands in for Gemini Live in bridge and end-to-end tests:
//! - Connect can succeed immediately, fail with a message, or wait for a gate
//! - Every session call is recorded in order
//! - Session events are injected through the registered callback

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

use voice_agent_gateway::core::live::{
    BoxedLiveSession, Content, LiveClient, LiveConnectConfig, LiveError, LiveResult,
    LiveServerMessage, LiveSession, RealtimeInput, SessionEvent, SessionEventCallback,
};

/// One recorded session call.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    Audio(Bytes),
    AudioEnd,
    ClientContent {
        turns: Vec<Content>,
        turn_complete: bool,
    },
}

pub struct MockSession {
    id: String,
    calls: Mutex<Vec<SessionCall>>,
    callback: Mutex<Option<SessionEventCallback>>,
    receive_count: AtomicUsize,
    close_count: AtomicUsize,
    send_error: Mutex<Option<String>>,
    close_error: AtomicBool,
}

impl MockSession {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            calls: Mutex::new(Vec::new()),
            callback: Mutex::new(None),
            receive_count: AtomicUsize::new(0),
            close_count: AtomicUsize::new(0),
            send_error: Mutex::new(None),
            close_error: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().clone()
    }

    pub fn receive_count(&self) -> usize {
        self.receive_count.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    /// Make every subsequent send fail with `message`.
    pub fn fail_sends(&self, message: &str) {
        *self.send_error.lock() = Some(message.to_string());
    }

    /// Make `close` return an error (it is still counted).
    pub fn fail_close(&self) {
        self.close_error.store(true, Ordering::SeqCst);
    }

    /// Deliver an event through the registered callback.
    pub fn emit(&self, event: SessionEvent) {
        let callback = self.callback.lock().clone();
        match callback {
            Some(callback) => callback(event),
            None => panic!("no receive callback registered"),
        }
    }

    pub fn emit_message(&self, message: LiveServerMessage) {
        self.emit(SessionEvent::Message(message));
    }

    fn record(&self, call: SessionCall) -> LiveResult<()> {
        if let Some(message) = self.send_error.lock().clone() {
            return Err(LiveError::WebSocketError(message));
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

#[async_trait]
impl LiveSession for MockSession {
    fn session_id(&self) -> String {
        self.id.clone()
    }

    async fn send_realtime_input(&self, input: RealtimeInput) -> LiveResult<()> {
        match input {
            RealtimeInput::Audio(bytes) => self.record(SessionCall::Audio(bytes)),
            RealtimeInput::AudioStreamEnd => self.record(SessionCall::AudioEnd),
        }
    }

    async fn send_client_content(
        &self,
        turns: Vec<Content>,
        turn_complete: bool,
    ) -> LiveResult<()> {
        self.record(SessionCall::ClientContent {
            turns,
            turn_complete,
        })
    }

    fn receive(&self, callback: SessionEventCallback) -> LiveResult<()> {
        self.receive_count.fetch_add(1, Ordering::SeqCst);
        let mut slot = self.callback.lock();
        if slot.is_some() {
            return Err(LiveError::AlreadyReceiving);
        }
        *slot = Some(callback);
        Ok(())
    }

    async fn close(&self) -> LiveResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        if self.close_error.load(Ordering::SeqCst) {
            return Err(LiveError::WebSocketError("close failed".to_string()));
        }
        Ok(())
    }
}

enum Outcome {
    Succeed,
    Fail(String),
}

pub struct MockLiveClient {
    outcome: Outcome,
    gate: Option<Arc<Notify>>,
    connect_calls: AtomicUsize,
    sessions: Mutex<Vec<Arc<MockSession>>>,
    session_added: Notify,
}

impl MockLiveClient {
    /// Connect succeeds immediately.
    pub fn new() -> Arc<Self> {
        Self::build(Outcome::Succeed, None)
    }

    /// Connect fails with `message`.
    pub fn failing(message: &str) -> Arc<Self> {
        Self::build(Outcome::Fail(message.to_string()), None)
    }

    /// Connect succeeds only after [`release`](Self::release).
    pub fn gated() -> Arc<Self> {
        Self::build(Outcome::Succeed, Some(Arc::new(Notify::new())))
    }

    fn build(outcome: Outcome, gate: Option<Arc<Notify>>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            gate,
            connect_calls: AtomicUsize::new(0),
            sessions: Mutex::new(Vec::new()),
            session_added: Notify::new(),
        })
    }

    /// Let one pending connect complete.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.sessions.lock().clone()
    }

    /// Wait until the `index`th session has been created.
    pub async fn wait_for_session(&self, index: usize) -> Arc<MockSession> {
        let wait = async {
            loop {
                let notified = self.session_added.notified();
                if let Some(session) = self.sessions.lock().get(index).cloned() {
                    return session;
                }
                notified.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .expect("session was not created in time")
    }
}

#[async_trait]
impl LiveClient for MockLiveClient {
    async fn connect(
        &self,
        _model: &str,
        _config: &LiveConnectConfig,
    ) -> LiveResult<BoxedLiveSession> {
        let n = self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.outcome {
            Outcome::Fail(message) => Err(LiveError::ConnectionFailed(message.clone())),
            Outcome::Succeed => {
                let session = MockSession::new(format!("mock-session-{n}"));
                self.sessions.lock().push(session.clone());
                self.session_added.notify_waiters();
                Ok(session)
            }
        }
    }

    fn provider(&self) -> &'static str {
        "mock"
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let wait = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("condition not met in time");
}
