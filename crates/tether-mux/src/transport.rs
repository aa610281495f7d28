//! The viewer side of the multiplexer: what a session can send to a viewer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Normal closure, used when a session is killed.
pub const CLOSE_NORMAL: u16 = 1000;

/// The viewer stopped answering keepalive probes.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// The session could not be started for this viewer.
pub const CLOSE_SPAWN_FAILED: u16 = 1011;

/// WebSocket close reasons are limited to 123 bytes.
pub const MAX_CLOSE_REASON: usize = 123;

/// Longest error message sent in a control envelope.
pub const MAX_ERROR_MESSAGE: usize = 500;

/// JSON control envelopes sent alongside raw output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlMessage {
    Exit {
        #[serde(rename = "exitCode")]
        exit_code: Option<i32>,
    },
    Error {
        message: String,
    },
}

/// One unit of data for a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerFrame {
    Output(Arc<[u8]>),
    Control(ControlMessage),
}

/// A connection observing a session.
///
/// Implementations must not block: `send` queues the frame and returns.
pub trait ViewerTransport: Send + Sync {
    fn send(&self, frame: ViewerFrame) -> Result<(), TransportError>;

    /// Bytes queued for this viewer that have not reached the wire yet.
    fn buffered_amount(&self) -> usize;

    /// Send a liveness probe. The answer arrives through
    /// [`Attachment::pong`](crate::Attachment::pong).
    fn ping(&self) -> Result<(), TransportError>;

    fn close(&self, code: u16, reason: &str);
}

/// Cut `text` to at most `max` bytes on a character boundary.
pub fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
