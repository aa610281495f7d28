//! Attaching viewers: replay, then live.

use std::sync::Arc;

use serde::Deserialize;
use tether_common::ClientId;
use tether_pty::SpawnOptions;

use crate::broadcast::ClientSlot;
use crate::hooks;
use crate::keepalive;
use crate::registry::SessionRegistry;
use crate::session::Session;
use crate::transport::{
    truncate_utf8, ControlMessage, ViewerFrame, ViewerTransport, CLOSE_NORMAL, CLOSE_SPAWN_FAILED,
    MAX_CLOSE_REASON, MAX_ERROR_MESSAGE,
};

/// Control messages a viewer may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Input { data: String },
    Resize { cols: i64, rows: i64 },
    ForceExit,
}

impl ClientMessage {
    /// Parse a text frame. Anything that is not a well-formed control
    /// message is `None` and should be treated as raw input.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

impl SessionRegistry {
    /// Attach `client` to session `id`, spawning it if it is not running.
    ///
    /// Spawn options come from the status store when it remembers the
    /// session, otherwise from `fallback`. If no session can be started the
    /// client gets one error message and is closed; `None` is returned.
    pub async fn attach(
        &self,
        id: &str,
        client: Arc<dyn ViewerTransport>,
        fallback: &SpawnOptions,
    ) -> Option<Attachment> {
        let session = match self.get_live(id).await {
            Some(session) => session,
            None => {
                let options = match hooks::saved_options(self.context().store.as_ref(), id) {
                    Some(saved) => SpawnOptions {
                        cols: fallback.cols.or(saved.cols),
                        rows: fallback.rows.or(saved.rows),
                        ..saved.or(fallback)
                    },
                    None => fallback.clone(),
                };
                match self.get_or_spawn(id, &options).await {
                    Ok(session) => session,
                    Err(e) => {
                        let reason = e.to_string();
                        let _ = client.send(ViewerFrame::Control(ControlMessage::Error {
                            message: truncate_utf8(&reason, MAX_ERROR_MESSAGE).to_string(),
                        }));
                        client.close(CLOSE_SPAWN_FAILED, truncate_utf8(&reason, MAX_CLOSE_REASON));
                        return None;
                    }
                }
            }
        };

        let client_id = ClientId::new();
        if !session.attach_client(client_id.clone(), client) {
            return None;
        }
        tracing::info!(session = %id, client = %client_id, "viewer attached");
        Some(Attachment {
            session,
            client: client_id,
        })
    }
}

impl Session {
    /// Replay scrollback to `transport`, then add it to the live set.
    ///
    /// Both happen under the session lock, which output handling also
    /// holds while appending and fanning out, so the viewer sees every byte
    /// exactly once and in order. Returns `false` if the session was killed
    /// in the meantime (the viewer is closed) or the replay send failed.
    pub(crate) fn attach_client(
        self: &Arc<Self>,
        client: ClientId,
        transport: Arc<dyn ViewerTransport>,
    ) -> bool {
        let mut state = self.state();
        if state.killed {
            transport.close(CLOSE_NORMAL, "session killed");
            return false;
        }
        if !state.scrollback.is_empty() {
            let snapshot: Arc<[u8]> = state.scrollback.snapshot().into();
            if let Err(e) = transport.send(ViewerFrame::Output(snapshot)) {
                tracing::debug!(session = %self.id(), error = %e, "replay failed");
                return false;
            }
        }
        if !state.alive && !state.killed {
            let exit = ControlMessage::Exit {
                exit_code: state.exit_code,
            };
            if transport.send(ViewerFrame::Control(exit)).is_err() {
                return false;
            }
        }
        state.clients.insert(client, ClientSlot::new(transport));

        let running = state.keepalive.as_ref().is_some_and(|h| !h.is_finished());
        if !running {
            let period = self.ctx.settings.keepalive_interval;
            state.keepalive = Some(keepalive::start(self, period));
        }
        true
    }
}

/// A viewer's handle on a session. Dropping it detaches the viewer.
pub struct Attachment {
    session: Arc<Session>,
    client: ClientId,
}

impl Attachment {
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client
    }

    /// Handle a text frame from the viewer.
    pub async fn handle_text(&self, text: &str) {
        match ClientMessage::parse(text) {
            Some(ClientMessage::Input { data }) => self.session.write_input(data.as_bytes()),
            Some(ClientMessage::Resize { cols, rows }) => self.session.resize(cols, rows),
            Some(ClientMessage::ForceExit) => {
                tracing::info!(session = %self.session.id(), client = %self.client, "force restart requested");
                self.session.force_restart_as_shell().await;
            }
            None => self.session.write_input(text.as_bytes()),
        }
    }

    /// Raw bytes from the viewer go straight to the process.
    pub fn handle_binary(&self, data: &[u8]) {
        self.session.write_input(data);
    }

    /// The viewer answered a keepalive probe.
    pub fn pong(&self) {
        if let Some(slot) = self.session.state().clients.get_mut(&self.client) {
            slot.awaiting_pong = false;
        }
    }

    /// Whether this viewer is still in the session's live set.
    pub fn is_attached(&self) -> bool {
        self.session.state().clients.contains_key(&self.client)
    }

    pub fn detach(self) {}
}

impl Drop for Attachment {
    fn drop(&mut self) {
        if self.session.remove_client(&self.client) {
            tracing::info!(session = %self.session.id(), client = %self.client, "viewer detached");
        }
    }
}
