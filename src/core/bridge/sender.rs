//! Per-connection output capability.
//!
//! A [`FrontendSender`] lets a bridge push frames to its caller without
//! knowing anything about the transport. It is a bundle of three closures.
//!
//! [`frontend_channel`] pairs a sender with the [`FrontendReceiver`] drained
//! by the socket writer. Data frames travel through a bounded channel. Close
//! requests travel beside it, so a backlog can never swallow them.

use std::fmt;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Capacity of the per-connection outbound channel.
pub const FRONTEND_CHANNEL_CAPACITY: usize = 1024;

/// Close reason used when the caller stops draining its outbound frames.
pub const FRONTEND_BACKLOG_REASON: &str = "caller too slow";

/// A frame queued for the caller's socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendFrame {
    /// JSON text frame
    Text(String),
    /// Raw audio frame
    Binary(Bytes),
    /// Close the connection with a reason
    Close(String),
}

type TextFn = Arc<dyn Fn(String) + Send + Sync>;
type BinaryFn = Arc<dyn Fn(Bytes) + Send + Sync>;
type CloseFn = Arc<dyn Fn(String) + Send + Sync>;

/// Sends frames to one caller. Calls never block.
#[derive(Clone)]
pub struct FrontendSender {
    send_text: TextFn,
    send_binary: BinaryFn,
    close: CloseFn,
}

impl fmt::Debug for FrontendSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrontendSender").finish_non_exhaustive()
    }
}

impl FrontendSender {
    pub fn new(
        send_text: impl Fn(String) + Send + Sync + 'static,
        send_binary: impl Fn(Bytes) + Send + Sync + 'static,
        close: impl Fn(String) + Send + Sync + 'static,
    ) -> Self {
        Self {
            send_text: Arc::new(send_text),
            send_binary: Arc::new(send_binary),
            close: Arc::new(close),
        }
    }

    pub fn send_text(&self, json: String) {
        (self.send_text)(json)
    }

    pub fn send_binary(&self, bytes: Bytes) {
        (self.send_binary)(bytes)
    }

    /// Ask the transport to close the connection.
    pub fn close(&self, reason: impl Into<String>) {
        (self.close)(reason.into())
    }
}

/// Close request shared by both ends of a frontend channel. The first reason wins.
#[derive(Clone, Default)]
struct CloseSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<String>>,
}

impl CloseSignal {
    fn request(&self, reason: String) {
        if self.reason.set(reason).is_ok() {
            self.token.cancel();
        }
    }

    fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    fn reason(&self) -> String {
        self.reason.get().cloned().unwrap_or_default()
    }
}

/// Create a sender and the receiver its frames are written from.
///
/// When `capacity` frames are waiting, the next frame is not queued: the
/// caller is closed with [`FRONTEND_BACKLOG_REASON`] instead. Frames sent
/// after a close request are discarded.
pub fn frontend_channel(capacity: usize) -> (FrontendSender, FrontendReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let signal = CloseSignal::default();

    let text_tx = tx.clone();
    let text_signal = signal.clone();
    let binary_signal = signal.clone();
    let close_signal = signal.clone();
    let sender = FrontendSender::new(
        move |json| enqueue(&text_tx, &text_signal, FrontendFrame::Text(json)),
        move |bytes| enqueue(&tx, &binary_signal, FrontendFrame::Binary(bytes)),
        move |reason| close_signal.request(reason),
    );

    let receiver = FrontendReceiver {
        frames: rx,
        signal,
        finished: false,
    };
    (sender, receiver)
}

fn enqueue(tx: &mpsc::Sender<FrontendFrame>, signal: &CloseSignal, frame: FrontendFrame) {
    if signal.is_requested() {
        tracing::trace!("Frontend closing, dropping frame");
        return;
    }
    match tx.try_send(frame) {
        Ok(()) => {}
        Err(TrySendError::Full(frame)) => {
            let kind = match frame {
                FrontendFrame::Text(_) => "text",
                FrontendFrame::Binary(_) => "binary",
                FrontendFrame::Close(_) => "close",
            };
            tracing::warn!(kind, "Frontend channel full, closing caller");
            signal.request(FRONTEND_BACKLOG_REASON.to_string());
        }
        Err(TrySendError::Closed(_)) => {
            tracing::trace!("Frontend channel closed, dropping frame");
        }
    }
}

/// Receiving end of [`frontend_channel`].
pub struct FrontendReceiver {
    frames: mpsc::Receiver<FrontendFrame>,
    signal: CloseSignal,
    finished: bool,
}

impl FrontendReceiver {
    /// Next frame to write.
    ///
    /// After a close request, the frames queued before it are yielded, then
    /// one [`FrontendFrame::Close`], then `None`. Without a close request,
    /// `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<FrontendFrame> {
        if self.finished {
            return None;
        }

        if !self.signal.is_requested() {
            tokio::select! {
                frame = self.frames.recv() => match frame {
                    Some(frame) => return Some(frame),
                    None if !self.signal.is_requested() => {
                        self.finished = true;
                        return None;
                    }
                    None => {}
                },
                _ = self.signal.token.cancelled() => {}
            }
        }

        if let Ok(frame) = self.frames.try_recv() {
            return Some(frame);
        }
        self.finished = true;
        Some(FrontendFrame::Close(self.signal.reason()))
    }

    /// Token cancelled as soon as anyone asks to close the caller.
    pub fn close_requested(&self) -> CancellationToken {
        self.signal.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_preserves_order() {
        let (sender, mut rx) = frontend_channel(8);

        sender.send_text("a".to_string());
        sender.send_binary(Bytes::from_static(&[1, 2]));
        sender.close("bye");

        assert_eq!(rx.recv().await, Some(FrontendFrame::Text("a".to_string())));
        assert_eq!(
            rx.recv().await,
            Some(FrontendFrame::Binary(Bytes::from_static(&[1, 2])))
        );
        assert_eq!(rx.recv().await, Some(FrontendFrame::Close("bye".to_string())));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_full_channel_closes_caller() {
        let (sender, mut rx) = frontend_channel(1);
        let closing = rx.close_requested();

        sender.send_text("first".to_string());
        sender.send_text("second".to_string());
        assert!(closing.is_cancelled());

        sender.close("later reason");
        sender.send_text("after close".to_string());

        assert_eq!(
            rx.recv().await,
            Some(FrontendFrame::Text("first".to_string()))
        );
        assert_eq!(
            rx.recv().await,
            Some(FrontendFrame::Close(FRONTEND_BACKLOG_REASON.to_string()))
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_close_is_not_blocked_by_backlog() {
        let (sender, mut rx) = frontend_channel(2);
        sender.send_binary(Bytes::from_static(&[1]));
        sender.send_binary(Bytes::from_static(&[2]));
        sender.close("done");

        assert!(rx.close_requested().is_cancelled());
        assert!(matches!(rx.recv().await, Some(FrontendFrame::Binary(_))));
        assert!(matches!(rx.recv().await, Some(FrontendFrame::Binary(_))));
        assert_eq!(rx.recv().await, Some(FrontendFrame::Close("done".to_string())));
    }

    #[tokio::test]
    async fn test_dropped_senders_end_stream() {
        let (sender, mut rx) = frontend_channel(4);
        sender.send_text("last".to_string());
        drop(sender);

        assert_eq!(rx.recv().await, Some(FrontendFrame::Text("last".to_string())));
        assert_eq!(rx.recv().await, None);
        assert!(!rx.close_requested().is_cancelled());
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (sender, rx) = frontend_channel(1);
        drop(rx);
        sender.send_text("nobody listening".to_string());
        sender.close("gone");
    }
}
