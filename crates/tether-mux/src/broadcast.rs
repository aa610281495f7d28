//! Fan-out of session output to attached viewers.

use std::collections::HashMap;
use std::sync::Arc;

use tether_common::ClientId;

use crate::transport::{ControlMessage, ViewerFrame, ViewerTransport};

/// Default backlog at which a viewer stops receiving live chunks: 64 KiB.
pub const DEFAULT_BACKPRESSURE_THRESHOLD: usize = 64 * 1024;

/// An attached viewer and its keepalive state.
pub struct ClientSlot {
    pub transport: Arc<dyn ViewerTransport>,
    /// A probe went out and no answer has arrived yet.
    pub awaiting_pong: bool,
}

impl ClientSlot {
    pub fn new(transport: Arc<dyn ViewerTransport>) -> Self {
        Self {
            transport,
            awaiting_pong: false,
        }
    }
}

/// Send `chunk` to every client below `threshold`, without blocking.
///
/// Clients whose backlog is at or above the threshold are skipped for this
/// chunk. Clients whose transport fails are removed. Returns the removed ids.
pub fn fan_out(
    clients: &mut HashMap<ClientId, ClientSlot>,
    chunk: &Arc<[u8]>,
    threshold: usize,
) -> Vec<ClientId> {
    let mut failed = Vec::new();
    for (id, slot) in clients.iter() {
        let backlog = slot.transport.buffered_amount();
        if backlog >= threshold {
            tracing::trace!(client = %id, backlog, "viewer lagging, chunk skipped");
            continue;
        }
        if let Err(e) = slot.transport.send(ViewerFrame::Output(Arc::clone(chunk))) {
            tracing::debug!(client = %id, error = %e, "viewer send failed, detaching");
            failed.push(id.clone());
        }
    }
    for id in &failed {
        clients.remove(id);
    }
    failed
}

/// Send one control envelope to every client, removing any that fail.
pub fn send_control(
    clients: &mut HashMap<ClientId, ClientSlot>,
    message: &ControlMessage,
) -> Vec<ClientId> {
    let mut failed = Vec::new();
    for (id, slot) in clients.iter() {
        if let Err(e) = slot.transport.send(ViewerFrame::Control(message.clone())) {
            tracing::debug!(client = %id, error = %e, "viewer control send failed, detaching");
            failed.push(id.clone());
        }
    }
    for id in &failed {
        clients.remove(id);
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingViewer;

    fn attach(
        clients: &mut HashMap<ClientId, ClientSlot>,
        viewer: &Arc<RecordingViewer>,
    ) -> ClientId {
        let id = ClientId::new();
        clients.insert(id.clone(), ClientSlot::new(viewer.clone()));
        id
    }

    #[test]
    fn every_client_below_threshold_gets_the_chunk() {
        let mut clients = HashMap::new();
        let a = RecordingViewer::new();
        let b = RecordingViewer::new();
        attach(&mut clients, &a);
        attach(&mut clients, &b);

        let removed = fan_out(&mut clients, &Arc::from(&b"hello"[..]), 1024);
        assert!(removed.is_empty());
        assert_eq!(a.output(), b"hello");
        assert_eq!(b.output(), b"hello");
    }

    #[test]
    fn lagging_client_is_skipped_not_removed() {
        let mut clients = HashMap::new();
        let fast = RecordingViewer::new();
        let slow = RecordingViewer::new();
        attach(&mut clients, &fast);
        attach(&mut clients, &slow);
        slow.set_buffered(DEFAULT_BACKPRESSURE_THRESHOLD);

        fan_out(&mut clients, &Arc::from(&b"one"[..]), DEFAULT_BACKPRESSURE_THRESHOLD);
        assert_eq!(fast.output(), b"one");
        assert!(slow.output().is_empty());
        assert_eq!(clients.len(), 2);

        slow.set_buffered(DEFAULT_BACKPRESSURE_THRESHOLD - 1);
        fan_out(&mut clients, &Arc::from(&b"two"[..]), DEFAULT_BACKPRESSURE_THRESHOLD);
        assert_eq!(fast.output(), b"onetwo");
        assert_eq!(slow.output(), b"two");
    }

    #[test]
    fn failing_client_is_removed() {
        let mut clients = HashMap::new();
        let ok = RecordingViewer::new();
        let broken = RecordingViewer::new();
        attach(&mut clients, &ok);
        let broken_id = attach(&mut clients, &broken);
        broken.fail_sends();

        let removed = fan_out(&mut clients, &Arc::from(&b"x"[..]), 1024);
        assert_eq!(removed, vec![broken_id]);
        assert_eq!(clients.len(), 1);
        assert_eq!(ok.output(), b"x");
    }

    #[test]
    fn control_goes_to_everyone() {
        let mut clients = HashMap::new();
        let a = RecordingViewer::new();
        attach(&mut clients, &a);
        send_control(&mut clients, &ControlMessage::Exit { exit_code: Some(0) });
        assert_eq!(a.controls(), vec![ControlMessage::Exit { exit_code: Some(0) }]);
    }
}
