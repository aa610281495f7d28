//! WebSocket-backed viewer transport.
//!
//! Frames are queued on an unbounded channel and written by a dedicated
//! task, so `send` never waits on the socket. The bytes queued but not yet
//! written are the viewer's backlog.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{Sink, SinkExt};
use tether_mux::{TransportError, ViewerFrame, ViewerTransport};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Something waiting to be written to the socket.
#[derive(Debug, PartialEq)]
pub enum Outbound {
    Binary(Vec<u8>),
    Text(String),
    Ping,
    Close(u16, String),
}

impl Outbound {
    fn weight(&self) -> usize {
        match self {
            Outbound::Binary(data) => data.len(),
            Outbound::Text(text) => text.len(),
            Outbound::Ping | Outbound::Close(..) => 0,
        }
    }

    fn into_message(self) -> Message {
        match self {
            Outbound::Binary(data) => Message::binary(data),
            Outbound::Text(text) => Message::text(text),
            Outbound::Ping => Message::Ping(Vec::new().into()),
            Outbound::Close(code, reason) => Message::Close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: reason.into(),
            })),
        }
    }
}

struct Shared {
    backlog: AtomicUsize,
    closed: AtomicBool,
}

/// The session-facing half of a WebSocket connection.
pub struct WsViewer {
    tx: mpsc::UnboundedSender<Outbound>,
    shared: Arc<Shared>,
}

/// The socket-facing half: drained by [`run_writer`].
pub struct OutboundQueue {
    rx: mpsc::UnboundedReceiver<Outbound>,
    shared: Arc<Shared>,
}

impl WsViewer {
    pub fn new() -> (Arc<Self>, OutboundQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            backlog: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });
        let viewer = Arc::new(Self {
            tx,
            shared: Arc::clone(&shared),
        });
        (viewer, OutboundQueue { rx, shared })
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn enqueue(&self, outbound: Outbound) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let weight = outbound.weight();
        self.shared.backlog.fetch_add(weight, Ordering::AcqRel);
        if self.tx.send(outbound).is_err() {
            self.shared.backlog.fetch_sub(weight, Ordering::AcqRel);
            self.shared.closed.store(true, Ordering::Release);
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    /// Queue a JSON text frame.
    pub fn send_json<T: serde::Serialize>(&self, value: &T) -> Result<(), TransportError> {
        let json =
            serde_json::to_string(value).map_err(|e| TransportError::Failed(e.to_string()))?;
        self.enqueue(Outbound::Text(json))
    }
}

impl ViewerTransport for WsViewer {
    fn send(&self, frame: ViewerFrame) -> Result<(), TransportError> {
        match frame {
            ViewerFrame::Output(data) => self.enqueue(Outbound::Binary(data.to_vec())),
            ViewerFrame::Control(message) => self.send_json(&message),
        }
    }

    fn buffered_amount(&self) -> usize {
        self.shared.backlog.load(Ordering::Acquire)
    }

    fn ping(&self) -> Result<(), TransportError> {
        self.enqueue(Outbound::Ping)
    }

    fn close(&self, code: u16, reason: &str) {
        if self.enqueue(Outbound::Close(code, reason.to_string())).is_ok() {
            self.shared.closed.store(true, Ordering::Release);
        }
    }
}

/// Write queued frames to `sink` until a close frame is written, the
/// socket fails, or every viewer handle is gone.
pub async fn run_writer<S>(mut sink: S, mut queue: OutboundQueue)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(outbound) = queue.rx.recv().await {
        let weight = outbound.weight();
        let is_close = matches!(outbound, Outbound::Close(..));
        let result = sink.send(outbound.into_message()).await;
        queue.shared.backlog.fetch_sub(weight, Ordering::AcqRel);
        if let Err(e) = result {
            tracing::debug!(error = %e, "socket write failed");
            break;
        }
        if is_close {
            break;
        }
    }
    queue.shared.closed.store(true, Ordering::Release);
}
