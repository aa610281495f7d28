//! Periodic liveness probes for attached viewers.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::session::Session;
use crate::transport::CLOSE_GOING_AWAY;

/// Start probing `session`'s viewers every `period`. The task ends by
/// itself once no viewers remain.
pub(crate) fn start(session: &Arc<Session>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(run(Arc::downgrade(session), period))
}

async fn run(session: Weak<Session>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(session) = session.upgrade() else {
            return;
        };
        if !session.probe_clients() {
            tracing::debug!(session = %session.id(), "no viewers left, keepalive stopped");
            return;
        }
    }
}

impl Session {
    /// One probe cycle: drop viewers that never answered the last probe and
    /// ping the rest. Returns `false` when no viewers remain.
    pub(crate) fn probe_clients(&self) -> bool {
        let mut state = self.state();
        let mut stale = Vec::new();
        for (id, slot) in state.clients.iter_mut() {
            if slot.awaiting_pong {
                stale.push(id.clone());
                continue;
            }
            match slot.transport.ping() {
                Ok(()) => slot.awaiting_pong = true,
                Err(e) => {
                    tracing::debug!(session = %self.id(), client = %id, error = %e, "ping failed");
                    stale.push(id.clone());
                }
            }
        }
        for id in stale {
            if let Some(slot) = state.clients.remove(&id) {
                tracing::info!(session = %self.id(), client = %id, "viewer unresponsive, disconnecting");
                slot.transport.close(CLOSE_GOING_AWAY, "keepalive timeout");
            }
        }
        if state.clients.is_empty() {
            state.keepalive = None;
            return false;
        }
        true
    }
}
