//! Per-connection handler: read the hello, then either answer it or attach
//! the connection to a session and forward frames.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use tether_mux::transport::CLOSE_NORMAL;
use tether_mux::{Attachment, SessionRegistry, ViewerTransport};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::protocol::{validate_session_id, Hello, ServerMessage};
use crate::viewer::{run_writer, WsViewer};

type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// How long to wait for the writer to flush after the conversation ends.
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle a single WebSocket connection.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    hello_timeout: Duration,
) {
    let (sink, mut stream) = ws.split();
    let (viewer, queue) = WsViewer::new();
    let mut writer = tokio::spawn(run_writer(sink, queue));

    let Some(hello) = read_hello(&mut stream, addr, hello_timeout, &viewer).await else {
        viewer.close(CLOSE_NORMAL, "");
        finish(writer).await;
        return;
    };

    if let Some(id) = hello_session_id(&hello) {
        if let Err(message) = validate_session_id(id) {
            tracing::warn!(peer = %addr, error = %message, "Rejected session id");
            let _ = viewer.send_json(&ServerMessage::Error { message });
            viewer.close(CLOSE_NORMAL, "");
            finish(writer).await;
            return;
        }
    }

    match hello {
        Hello::List => {
            let sessions = registry.list().await;
            let _ = viewer.send_json(&ServerMessage::Sessions { sessions });
            viewer.close(CLOSE_NORMAL, "");
        }
        Hello::Kill { session_id } => {
            let ok = registry.kill(&session_id).await;
            tracing::info!(peer = %addr, session = %session_id, ok, "Kill requested");
            let _ = viewer.send_json(&ServerMessage::Killed { session_id, ok });
            viewer.close(CLOSE_NORMAL, "");
        }
        Hello::Restart { session_id } => {
            let ok = registry.restart(&session_id).await.is_ok();
            tracing::info!(peer = %addr, session = %session_id, ok, "Restart requested");
            let _ = viewer.send_json(&ServerMessage::Restarted { session_id, ok });
            viewer.close(CLOSE_NORMAL, "");
        }
        Hello::Attach { session_id, spawn } => {
            let transport: Arc<dyn ViewerTransport> = viewer.clone();
            if let Some(attachment) = registry.attach(&session_id, transport, &spawn).await {
                tracing::info!(peer = %addr, session = %session_id, "Viewer connected");
                let writer_done = forward(&mut stream, &attachment, &mut writer).await;
                drop(attachment);
                tracing::info!(peer = %addr, session = %session_id, "Viewer disconnected");
                if writer_done {
                    return;
                }
                viewer.close(CLOSE_NORMAL, "");
            }
        }
    }

    finish(writer).await;
}

/// Forward viewer frames into the session until either side hangs up.
/// Returns `true` if the writer task already finished.
async fn forward(
    stream: &mut WsStream,
    attachment: &Attachment,
    writer: &mut JoinHandle<()>,
) -> bool {
    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => attachment.handle_text(text.as_str()).await,
                    Some(Ok(Message::Binary(data))) => attachment.handle_binary(&data),
                    Some(Ok(Message::Pong(_))) => attachment.pong(),
                    Some(Ok(Message::Close(_))) | None => return false,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "WS error");
                        return false;
                    }
                    // Pings are answered by tungstenite.
                    Some(Ok(_)) => {}
                }
            }
            // The session closed us: killed, or keepalive gave up.
            _ = &mut *writer => return true,
        }
    }
}

async fn finish(writer: JoinHandle<()>) {
    if tokio::time::timeout(WRITER_FLUSH_TIMEOUT, writer).await.is_err() {
        tracing::debug!("Writer did not finish in time");
    }
}

fn hello_session_id(hello: &Hello) -> Option<&str> {
    match hello {
        Hello::Attach { session_id, .. }
        | Hello::Kill { session_id }
        | Hello::Restart { session_id } => Some(session_id),
        Hello::List => None,
    }
}

/// Read and parse the first message as a [`Hello`]. A malformed hello is
/// answered with an error message.
async fn read_hello(
    stream: &mut WsStream,
    addr: SocketAddr,
    timeout: Duration,
    viewer: &WsViewer,
) -> Option<Hello> {
    let frame = tokio::time::timeout(timeout, stream.next()).await;

    match frame {
        Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<Hello>(text.as_str()) {
            Ok(hello) => Some(hello),
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "Invalid hello message");
                let _ = viewer.send_json(&ServerMessage::Error {
                    message: format!("invalid hello: {e}"),
                });
                None
            }
        },
        Ok(Some(Ok(_))) => {
            tracing::warn!(peer = %addr, "Expected text hello");
            None
        }
        Ok(Some(Err(e))) => {
            tracing::warn!(peer = %addr, error = %e, "WS error during hello");
            None
        }
        Ok(None) => {
            tracing::debug!(peer = %addr, "Connection closed before hello");
            None
        }
        Err(_) => {
            tracing::warn!(peer = %addr, timeout_secs = timeout.as_secs(), "Hello timeout");
            None
        }
    }
}
