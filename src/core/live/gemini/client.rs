//! Gemini Live client implementation.
//!
//! This module provides the client that implements [`LiveClient`] using the
//! Gemini Live `BidiGenerateContent` WebSocket API.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/...BidiGenerateContent?key=<key>`
//! - Protocol: WebSocket with JSON frames; the server may send JSON in binary frames
//! - Input audio: PCM 16-bit, 16kHz, mono, little-endian, base64 encoded
//! - Output audio: PCM 16-bit, 24kHz, mono, base64 encoded in `inlineData`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::config::{GeminiLiveConfig, normalize_model};
use super::messages::{ClientMessage, decode_server_message};
use crate::core::live::base::{
    BoxedLiveSession, Content, LiveClient, LiveConnectConfig, LiveError, LiveResult, LiveSession,
    RealtimeInput, SessionEvent, SessionEventCallback,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

// =============================================================================
// Gemini Live Client
// =============================================================================

/// Opens Gemini Live sessions.
#[derive(Debug, Clone)]
pub struct GeminiLiveClient {
    config: GeminiLiveConfig,
}

impl GeminiLiveClient {
    /// Create a client. Fails when no API key is configured.
    pub fn new(config: GeminiLiveConfig) -> LiveResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LiveError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }
        // Surface a malformed base URL at startup rather than on first connect
        config.ws_url()?;
        Ok(Self { config })
    }
}

fn map_connect_error(error: tungstenite::Error) -> LiveError {
    match &error {
        tungstenite::Error::Http(response) => {
            let status = response.status();
            let body = response
                .body()
                .as_deref()
                .map(String::from_utf8_lossy)
                .map(|body| body.trim().to_string())
                .filter(|body| !body.is_empty());
            let detail = body.unwrap_or_else(|| status.to_string());
            if status == http::StatusCode::UNAUTHORIZED || status == http::StatusCode::FORBIDDEN {
                LiveError::AuthenticationFailed(detail)
            } else {
                LiveError::ConnectionFailed(detail)
            }
        }
        _ => LiveError::ConnectionFailed(error.to_string()),
    }
}

#[async_trait]
impl LiveClient for GeminiLiveClient {
    async fn connect(
        &self,
        model: &str,
        config: &LiveConnectConfig,
    ) -> LiveResult<BoxedLiveSession> {
        let url = self.config.ws_url()?;
        let model = normalize_model(model);

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(map_connect_error)?;

        let (sink, stream) = ws_stream.split();
        let session = GeminiLiveSession::new(sink, stream);

        session.send(&ClientMessage::setup(&model, config)).await?;

        tracing::info!(
            session_id = %session.session_id,
            model = %model,
            "Connected to Gemini Live"
        );
        Ok(Arc::new(session))
    }

    fn provider(&self) -> &'static str {
        "gemini"
    }
}

// =============================================================================
// Gemini Live Session
// =============================================================================

/// One open Gemini Live WebSocket.
///
/// Frames arriving before [`LiveSession::receive`] stay buffered in the
/// stream; the reader task only starts once a callback is registered.
pub struct GeminiLiveSession {
    session_id: String,
    sink: Arc<Mutex<WsSink>>,
    stream: parking_lot::Mutex<Option<SplitStream<WsStream>>>,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
    closed: Arc<AtomicBool>,
}

impl GeminiLiveSession {
    fn new(sink: WsSink, stream: SplitStream<WsStream>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            sink: Arc::new(Mutex::new(sink)),
            stream: parking_lot::Mutex::new(Some(stream)),
            reader: parking_lot::Mutex::new(None),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn send(&self, message: &ClientMessage) -> LiveResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LiveError::NotConnected);
        }

        let json = serde_json::to_string(message)
            .map_err(|e| LiveError::SerializationError(e.to_string()))?;

        self.sink
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| LiveError::WebSocketError(e.to_string()))
    }

    fn dispatch(session_id: &str, raw: &str, callback: &SessionEventCallback) {
        match decode_server_message(raw) {
            Ok(message) => callback(SessionEvent::Message(message)),
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Dropping server frame");
            }
        }
    }

    async fn read_loop(
        session_id: String,
        mut stream: SplitStream<WsStream>,
        sink: Arc<Mutex<WsSink>>,
        closed: Arc<AtomicBool>,
        callback: SessionEventCallback,
    ) {
        let reason = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    Self::dispatch(&session_id, text.as_str(), &callback);
                }
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => Self::dispatch(&session_id, text, &callback),
                    Err(_) => {
                        tracing::warn!(
                            session_id = %session_id,
                            len = data.len(),
                            "Dropping non UTF-8 binary frame"
                        );
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sink.lock().await.send(Message::Pong(data)).await {
                        tracing::debug!(session_id = %session_id, error = %e, "Failed to send pong");
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(session_id = %session_id, ?frame, "Gemini Live closed the session");
                    break frame
                        .filter(|f| f.code != CloseCode::Normal)
                        .map(|f| format!("{} ({})", f.reason.as_str(), u16::from(f.code)));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(session_id = %session_id, error = %e, "Gemini Live receive error");
                    break Some(e.to_string());
                }
                None => break None,
            }
        };

        // A locally requested close is not reported back
        if !closed.swap(true, Ordering::AcqRel) {
            callback(SessionEvent::Closed { reason });
        }
    }
}

#[async_trait]
impl LiveSession for GeminiLiveSession {
    fn session_id(&self) -> String {
        self.session_id.clone()
    }

    async fn send_realtime_input(&self, input: RealtimeInput) -> LiveResult<()> {
        let message = match input {
            RealtimeInput::Audio(data) => ClientMessage::audio(&data),
            RealtimeInput::AudioStreamEnd => ClientMessage::audio_stream_end(),
        };
        self.send(&message).await
    }

    async fn send_client_content(
        &self,
        turns: Vec<Content>,
        turn_complete: bool,
    ) -> LiveResult<()> {
        self.send(&ClientMessage::client_content(&turns, turn_complete))
            .await
    }

    fn receive(&self, callback: SessionEventCallback) -> LiveResult<()> {
        let stream = self
            .stream
            .lock()
            .take()
            .ok_or(LiveError::AlreadyReceiving)?;

        let handle = tokio::spawn(Self::read_loop(
            self.session_id.clone(),
            stream,
            self.sink.clone(),
            self.closed.clone(),
            callback,
        ));
        *self.reader.lock() = Some(handle);
        Ok(())
    }

    async fn close(&self) -> LiveResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let result = self
            .sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| LiveError::WebSocketError(e.to_string()));

        if let Some(handle) = self.reader.lock().take() {
            handle.abort();
        }

        tracing::info!(session_id = %self.session_id, "Gemini Live session closed");
        result
    }
}

impl Drop for GeminiLiveSession {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    async fn spawn_server() -> (
        String,
        mpsc::UnboundedReceiver<WebSocketStream<TcpStream>>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let ws = tokio_tungstenite::accept_async(socket).await.unwrap();
                let _ = tx.send(ws);
            }
        });
        (format!("http://{addr}"), rx)
    }

    fn collector() -> (SessionEventCallback, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: SessionEventCallback = Arc::new(move |event| {
            let _ = tx.send(event);
        });
        (callback, rx)
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = GeminiLiveClient::new(GeminiLiveConfig::new("", None));
        assert!(matches!(result, Err(LiveError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_connect_sends_setup_first() {
        let (base_url, mut accepted) = spawn_server().await;
        let client = GeminiLiveClient::new(GeminiLiveConfig::new("k", Some(&base_url))).unwrap();

        let session = client
            .connect("gemini-test", &LiveConnectConfig::default())
            .await
            .unwrap();
        assert!(!session.session_id().is_empty());

        let mut server = accepted.recv().await.unwrap();
        let first = server.next().await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(first.to_text().unwrap()).unwrap();
        assert_eq!(json["setup"]["model"], "models/gemini-test");

        session
            .send_client_content(vec![Content::user_text("hi")], true)
            .await
            .unwrap();
        let second = server.next().await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(second.to_text().unwrap()).unwrap();
        assert_eq!(json["clientContent"]["turnComplete"], true);
    }

    #[tokio::test]
    async fn test_receive_delivers_buffered_events_and_close() {
        let (base_url, mut accepted) = spawn_server().await;
        let client = GeminiLiveClient::new(GeminiLiveConfig::new("k", Some(&base_url))).unwrap();
        let session = client
            .connect("m", &LiveConnectConfig::default())
            .await
            .unwrap();

        let mut server = accepted.recv().await.unwrap();
        let _setup = server.next().await.unwrap().unwrap();

        // Sent before the callback exists
        server
            .send(Message::Text(r#"{"setupComplete":{}}"#.into()))
            .await
            .unwrap();
        server
            .send(Message::Binary(
                r#"{"serverContent":{"turnComplete":true}}"#.as_bytes().to_vec().into(),
            ))
            .await
            .unwrap();

        let (callback, mut events) = collector();
        session.receive(callback).unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first, SessionEvent::Message(ref m) if m.setup_complete));

        let second = events.recv().await.unwrap();
        match second {
            SessionEvent::Message(m) => {
                assert_eq!(m.server_content.unwrap().turn_complete, Some(true));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        server.close(None).await.unwrap();
        let closed = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed, SessionEvent::Closed { reason: None });
    }

    #[tokio::test]
    async fn test_receive_twice_is_rejected() {
        let (base_url, _accepted) = spawn_server().await;
        let client = GeminiLiveClient::new(GeminiLiveConfig::new("k", Some(&base_url))).unwrap();
        let session = client
            .connect("m", &LiveConnectConfig::default())
            .await
            .unwrap();

        let (callback, _events) = collector();
        session.receive(callback.clone()).unwrap();
        assert!(matches!(
            session.receive(callback),
            Err(LiveError::AlreadyReceiving)
        ));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (base_url, _accepted) = spawn_server().await;
        let client = GeminiLiveClient::new(GeminiLiveConfig::new("k", Some(&base_url))).unwrap();
        let session = client
            .connect("m", &LiveConnectConfig::default())
            .await
            .unwrap();

        session.close().await.unwrap();
        session.close().await.unwrap();
        let result = session
            .send_realtime_input(RealtimeInput::AudioStreamEnd)
            .await;
        assert!(matches!(result, Err(LiveError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        // Nothing listens on this port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            GeminiLiveClient::new(GeminiLiveConfig::new("k", Some(&format!("http://{addr}"))))
                .unwrap();
        let result = client.connect("m", &LiveConnectConfig::default()).await;
        assert!(matches!(result, Err(LiveError::ConnectionFailed(_))));
    }
}
